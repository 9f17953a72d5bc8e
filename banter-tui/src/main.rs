//! banter — a terminal chat client.
//!
//! Startup wiring: parse flags, load config, prompt for anything missing,
//! connect and log in, then hand the terminal to the TUI. The protocol core
//! lives in `banter-sdk`; this binary supplies the collaborators (config,
//! stdin prompts, the ratatui front end) and the log plumbing.

mod app;
mod config;
mod logsink;
mod prompt;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures_util::StreamExt;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

use banter_sdk::clock::{Clock, SystemClock};
use banter_sdk::session::{ChatUi, Session};
use banter_sdk::transport::Transport;
use banter_sdk::EventBus;

use crate::app::{App, Focus, UiEvent};
use crate::config::Config;
use crate::logsink::LogSink;
use crate::prompt::StdinPrompt;

const VERSION: &str = "v0.1.0";

#[derive(Debug, Parser)]
#[command(name = "banter", about = "Terminal chat client", disable_version_flag = true)]
struct Cli {
    /// Print version and exit.
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Log verbosity, 0 (errors only) to 6 (trace).
    #[arg(short = 'l', long = "log-level", default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=6))]
    log_level: u8,
}

fn level_filter(level: u8) -> LevelFilter {
    match level {
        0..=2 => LevelFilter::ERROR,
        3 => LevelFilter::WARN,
        4 => LevelFilter::INFO,
        5 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{VERSION}");
        return Ok(());
    }

    let log_sink = LogSink::stderr();
    tracing_subscriber::fmt()
        .with_max_level(level_filter(cli.log_level))
        .with_writer(log_sink.clone())
        .with_ansi(false)
        .without_time()
        .init();

    let mut cfg = Config::load();
    let server_address = cfg
        .server_address
        .clone()
        .unwrap_or_else(prompt::ask_server_address);
    let tls = match cfg.tls_mode {
        Some(tls) => tls,
        None => prompt::ask_tls_mode(),
    };
    let nickname = cfg.nickname.clone().unwrap_or_else(prompt::ask_nickname);

    let bus = Arc::new(EventBus::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let transport = Arc::new(Transport::new(
        Arc::clone(&bus),
        Arc::clone(&clock),
        tls,
        &server_address,
    ));
    let session = Session::new(
        transport.clone(),
        Arc::clone(&clock),
        Arc::new(StdinPrompt),
        &nickname,
    );

    // Everything is registered before the receive loop starts consuming.
    session.install_handlers(&bus).await;

    session.connect().await;

    // A protocol desync on an established connection is unrecoverable.
    let reader = Arc::clone(&transport);
    tokio::spawn(async move {
        if let Err(e) = reader.receive_loop().await {
            error!(error = %e, "receive loop terminated");
            std::process::exit(1);
        }
    });

    session.login_and_await_token().await?;

    // Persist the outcome of the naming negotiation.
    cfg.server_address = Some(server_address);
    cfg.tls_mode = Some(tls);
    cfg.nickname = Some(session.nickname());
    cfg.save();

    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    session.attach_ui(Arc::new(UiBridge {
        tx: ui_tx.clone(),
    }));
    log_sink.redirect_to_ui(ui_tx);

    let mut app = App::new();
    {
        let session = Arc::clone(&session);
        app.add_on_msg_send_listener(move |text| {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session.post_message(&text).await;
            });
        });
    }
    {
        let session = Arc::clone(&session);
        app.add_on_online_box_open_listener(move || {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session.request_online_users().await;
            });
        });
    }

    let terminal = ratatui::init();
    let result = run_event_loop(terminal, &mut app, ui_rx).await;
    ratatui::restore();

    transport.close().await;
    result
}

/// Bridges the protocol layer to the UI loop's queue; nothing here blocks
/// the receive-loop task.
struct UiBridge {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChatUi for UiBridge {
    fn print_to_chat_box(&self, nickname: &str, text: &str, is_system: bool) -> Result<()> {
        self.tx
            .send(UiEvent::Chat {
                nickname: nickname.to_string(),
                text: text.to_string(),
                is_system,
            })
            .map_err(|_| anyhow::anyhow!("UI event queue is closed"))
    }

    fn push_online_users(&self, users: Vec<String>) {
        let _ = self.tx.send(UiEvent::OnlineUsers(users));
    }
}

async fn run_event_loop(
    mut terminal: DefaultTerminal,
    app: &mut App,
    mut ui_rx: mpsc::UnboundedReceiver<UiEvent>,
) -> Result<()> {
    let mut terminal_events = EventStream::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::draw(frame, app))?;

        tokio::select! {
            Some(event) = ui_rx.recv() => app.apply(event),
            Some(result) = terminal_events.next() => match result {
                Ok(event) => handle_terminal_event(app, event),
                Err(e) => error!(error = %e, "read terminal event"),
            },
        }
    }

    Ok(())
}

fn handle_terminal_event(app: &mut App, event: Event) {
    let Event::Key(key) = event else {
        return;
    };
    if key.kind != KeyEventKind::Press {
        return;
    }

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Tab => app.next_focus(),
        KeyCode::F(2) => app.toggle_online_box(),
        KeyCode::Enter if app.focus == Focus::Input => app.send_input(),
        // Insert a newline without sending.
        KeyCode::F(3) if app.focus == Focus::Input => app.insert_newline(),
        KeyCode::Backspace if app.focus == Focus::Input => app.backspace(),
        KeyCode::Left if app.focus == Focus::Input => app.move_left(),
        KeyCode::Right if app.focus == Focus::Input => app.move_right(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::Char(c) if app.focus == Focus::Input => app.insert_char(c),
        _ => {}
    }
}
