//! Persistent configuration for the banter client.
//!
//! Config file lives at `<config_dir>/banter/config.toml`. Missing file is
//! normal on first run; the interactive prompts fill the gaps and the
//! resolved values are written back after the naming negotiation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server address in form of `host:port`.
    pub server_address: Option<String>,
    /// Connect to the server over TLS?
    pub tls_mode: Option<bool>,
    /// Nickname to log in with.
    pub nickname: Option<String>,
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("banter")
        .join("config.toml")
}

impl Config {
    pub fn load() -> Self {
        let path = config_path();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(s) => match toml::from_str(&s) {
                    Ok(c) => return c,
                    Err(e) => warn!(path = %path.display(), error = %e, "bad config file"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "read config file"),
            }
        } else {
            debug!(path = %path.display(), "no config file, will prompt");
        }
        Self::default()
    }

    pub fn save(&self) {
        let path = config_path();
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        match toml::to_string_pretty(self) {
            Ok(s) => {
                if let Err(e) = std::fs::write(&path, s) {
                    warn!(path = %path.display(), error = %e, "save config file");
                }
            }
            Err(e) => warn!(error = %e, "serialize config"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_round_trip() {
        let config = Config {
            server_address: Some("chat.example.org:8443".to_string()),
            tls_mode: Some(true),
            nickname: Some("alice".to_string()),
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.server_address.as_deref(), Some("chat.example.org:8443"));
        assert_eq!(back.tls_mode, Some(true));
        assert_eq!(back.nickname.as_deref(), Some("alice"));
    }

    #[test]
    fn missing_fields_stay_unset() {
        let back: Config = toml::from_str("nickname = \"bob\"\n").unwrap();
        assert!(back.server_address.is_none());
        assert!(back.tls_mode.is_none());
        assert_eq!(back.nickname.as_deref(), Some("bob"));
    }
}
