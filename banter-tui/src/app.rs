//! Application state for the TUI.

use std::collections::VecDeque;

use tracing::warn;

/// Maximum number of lines kept in the chat box.
const MAX_MESSAGES: usize = 1000;

/// Longest message the input field accepts.
pub const MAX_INPUT_CHARS: usize = 2000;

/// A single line in the chat box.
#[derive(Debug, Clone)]
pub struct ChatLine {
    pub timestamp: String,
    pub nickname: String,
    pub text: String,
    pub is_system: bool,
}

/// Events marshalled onto the UI loop from other tasks. The queue is FIFO
/// and consumed by the single UI task only.
#[derive(Debug)]
pub enum UiEvent {
    Chat {
        nickname: String,
        text: String,
        is_system: bool,
    },
    OnlineUsers(Vec<String>),
    Log(String),
}

/// Which view currently has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Chat,
    Online,
}

/// Top-level TUI state.
pub struct App {
    pub messages: VecDeque<ChatLine>,
    pub online_users: Vec<String>,
    pub online_box_open: bool,
    pub focus: Focus,
    /// Input buffer; may span multiple lines.
    pub input: String,
    /// Cursor position in `input`, as a char offset.
    pub cursor: usize,
    /// Chat scroll offset from the bottom (0 = at bottom).
    pub chat_scroll: u16,
    pub online_scroll: u16,
    pub should_quit: bool,
    on_msg_send: Vec<Box<dyn Fn(String) + Send>>,
    on_online_box_open: Vec<Box<dyn Fn() + Send>>,
}

impl App {
    pub fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            online_users: Vec::new(),
            online_box_open: false,
            focus: Focus::Input,
            input: String::new(),
            cursor: 0,
            chat_scroll: 0,
            online_scroll: 0,
            should_quit: false,
            on_msg_send: Vec::new(),
            on_online_box_open: Vec::new(),
        }
    }

    /// Register `listener` to run when a message from the input field is
    /// sent.
    pub fn add_on_msg_send_listener(&mut self, listener: impl Fn(String) + Send + 'static) {
        self.on_msg_send.push(Box::new(listener));
    }

    /// Register `listener` to run when the online-users box is opened.
    pub fn add_on_online_box_open_listener(&mut self, listener: impl Fn() + Send + 'static) {
        self.on_online_box_open.push(Box::new(listener));
    }

    /// Apply one queued event from the protocol layer or the log sink.
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Chat {
                nickname,
                text,
                is_system,
            } => self.push_chat(&nickname, &text, is_system),
            UiEvent::OnlineUsers(mut users) => {
                users.sort();
                self.online_users = users;
                self.online_scroll = 0;
            }
            UiEvent::Log(line) => self.push_chat("", &line, true),
        }
    }

    /// Append one chat line, dropping the oldest past capacity.
    pub fn push_chat(&mut self, nickname: &str, text: &str, is_system: bool) {
        self.messages.push_back(ChatLine {
            timestamp: now_str(),
            nickname: nickname.to_string(),
            text: text.to_string(),
            is_system,
        });
        if self.messages.len() > MAX_MESSAGES {
            self.messages.pop_front();
        }
        // New lines snap the view back to the bottom.
        self.chat_scroll = 0;
    }

    /// Fire the message-send listeners with the trimmed buffer, then clear
    /// the input field.
    pub fn send_input(&mut self) {
        let text = self.input.trim().to_string();
        for listener in &self.on_msg_send {
            listener(text.clone());
        }
        self.input.clear();
        self.cursor = 0;
    }

    /// Open or close the online-users box. Opening fires the open listeners.
    pub fn toggle_online_box(&mut self) {
        if self.online_box_open {
            self.online_box_open = false;
            if self.focus == Focus::Online {
                self.focus = Focus::Input;
            }
        } else {
            self.online_box_open = true;
            self.online_scroll = 0;
            for listener in &self.on_online_box_open {
                listener();
            }
        }
    }

    /// Cycle focus over the visible views.
    pub fn next_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Input => Focus::Chat,
            Focus::Chat if self.online_box_open => Focus::Online,
            Focus::Chat => Focus::Input,
            Focus::Online => Focus::Input,
        };
    }

    pub fn insert_char(&mut self, c: char) {
        if self.input.chars().count() >= MAX_INPUT_CHARS {
            warn!("message is longer than {MAX_INPUT_CHARS} symbols");
            return;
        }
        let at = self.byte_cursor();
        self.input.insert(at, c);
        self.cursor += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_cursor();
        self.input.remove(at);
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    /// Scroll the focused scrollable view one row away from the bottom.
    pub fn scroll_up(&mut self) {
        match self.focus {
            Focus::Chat => self.chat_scroll = self.chat_scroll.saturating_add(1),
            Focus::Online => self.online_scroll = self.online_scroll.saturating_add(1),
            Focus::Input => {}
        }
    }

    /// Scroll the focused scrollable view one row toward the bottom.
    pub fn scroll_down(&mut self) {
        match self.focus {
            Focus::Chat => self.chat_scroll = self.chat_scroll.saturating_sub(1),
            Focus::Online => self.online_scroll = self.online_scroll.saturating_sub(1),
            Focus::Input => {}
        }
    }

    /// Cursor position as (row, column) within the input buffer.
    pub fn cursor_row_col(&self) -> (u16, u16) {
        let mut row = 0u16;
        let mut col = 0u16;
        for c in self.input.chars().take(self.cursor) {
            if c == '\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (row, col)
    }

    fn byte_cursor(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

fn now_str() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
