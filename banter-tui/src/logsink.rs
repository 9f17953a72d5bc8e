//! Log writer that targets stderr until the TUI owns the terminal, then the
//! chat box.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

use crate::app::UiEvent;

enum Target {
    Stderr,
    Ui(mpsc::UnboundedSender<UiEvent>),
}

/// Swappable writer behind the tracing subscriber.
#[derive(Clone)]
pub struct LogSink {
    target: Arc<Mutex<Target>>,
}

impl LogSink {
    pub fn stderr() -> Self {
        Self {
            target: Arc::new(Mutex::new(Target::Stderr)),
        }
    }

    /// Route subsequent log lines into the chat box queue.
    pub fn redirect_to_ui(&self, tx: mpsc::UnboundedSender<UiEvent>) {
        *self.target.lock().unwrap() = Target::Ui(tx);
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &*self.target.lock().unwrap() {
            Target::Stderr => io::stderr().write(buf),
            Target::Ui(tx) => {
                let line = String::from_utf8_lossy(buf).trim_end().to_string();
                if !line.is_empty() {
                    let _ = tx.send(UiEvent::Log(line));
                }
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &*self.target.lock().unwrap() {
            Target::Stderr => io::stderr().flush(),
            Target::Ui(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
