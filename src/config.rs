use std::path::PathBuf;

use clap::Parser;

use crate::prefs::default_preferences_path;
use crate::transport::{DEFAULT_REALTIME_MODEL, DEFAULT_REALTIME_URL};

/// Deckhand - talk to a realtime assistant that builds your slides
#[derive(Parser, Debug, Clone)]
#[command(name = "deckhand")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Base URL of the backend serving `/api/session`
    #[arg(long, env = "DECKHAND_SESSION_URL", default_value = "http://localhost:3000")]
    pub session_url: String,

    /// Realtime WebSocket endpoint
    #[arg(long, env = "DECKHAND_REALTIME_URL", default_value = DEFAULT_REALTIME_URL)]
    pub realtime_url: String,

    /// Realtime model name
    #[arg(long, env = "DECKHAND_MODEL", default_value = DEFAULT_REALTIME_MODEL)]
    pub model: String,

    /// Agent set to load; unknown keys fall back to the default set
    #[arg(long, env = "DECKHAND_AGENT_CONFIG")]
    pub agent_config: Option<String>,

    /// Agent to select within the set; defaults to the first one
    #[arg(long, env = "DECKHAND_AGENT")]
    pub agent: Option<String>,

    /// Preferences file
    #[arg(long, env = "DECKHAND_PREFERENCES", value_name = "FILE")]
    pub preferences: Option<PathBuf>,
}

impl Config {
    pub fn preferences_path(&self) -> PathBuf {
        self.preferences
            .clone()
            .unwrap_or_else(default_preferences_path)
    }
}
