//! Blocking stdin prompts for first-run setup and name collisions.
//!
//! These run on plain terminal I/O before the TUI owns the screen (and, for
//! a mid-session name collision, from a blocking task off the receive loop).

use std::io::{self, BufRead, Write};

use banter_sdk::session::NicknamePrompt;

/// Longest nickname the server accepts.
pub const MAX_NICKNAME_CHARS: usize = 20;

/// Ask for the server address, re-prompting until it is non-empty.
pub fn ask_server_address() -> String {
    ask("Enter server address in format of 'host:port': ", |input| {
        !input.is_empty()
    })
}

/// Ask whether to connect over TLS.
pub fn ask_tls_mode() -> bool {
    loop {
        let answer = ask("Connect to server using TLS? (y/n): ", |input| {
            matches!(input.to_lowercase().as_str(), "y" | "n")
        });
        match answer.to_lowercase().as_str() {
            "y" => return true,
            "n" => return false,
            _ => continue,
        }
    }
}

/// Ask for a nickname, re-prompting on empty or over-long input.
pub fn ask_nickname() -> String {
    ask("Enter your nickname: ", |input| {
        if !valid_nickname(input) {
            if input.chars().count() > MAX_NICKNAME_CHARS {
                eprintln!("Nicknames longer than {MAX_NICKNAME_CHARS} symbols are not allowed");
            }
            return false;
        }
        true
    })
}

fn valid_nickname(input: &str) -> bool {
    !input.is_empty() && input.chars().count() <= MAX_NICKNAME_CHARS
}

/// Print `prompt`, read one trimmed line, repeat until `valid` accepts it.
fn ask(prompt: &str, valid: impl Fn(&str) -> bool) -> String {
    let stdin = io::stdin();
    loop {
        eprint!("{prompt}");
        let _ = io::stderr().flush();

        let mut input = String::new();
        if let Err(e) = stdin.lock().read_line(&mut input) {
            eprintln!("Read from standard input: {e}");
            continue;
        }
        let input = input.trim();
        if valid(input) {
            return input.to_string();
        }
    }
}

/// The stdin collaborator handed to the session for name-collision retries.
pub struct StdinPrompt;

impl NicknamePrompt for StdinPrompt {
    fn ask_nickname(&self) -> String {
        ask_nickname()
    }
}
