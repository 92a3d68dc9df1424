//! Daemon configuration
//!
//! Everything is read once at startup from a single JSON file:
//!
//! ```json
//! {
//!     "logger": {
//!         "admins": ["alice"],
//!         "command_channel": "chatlogbot",
//!         "channel_list_path": "channels.json"
//!     },
//!     "twitch": { "nick": "justinfan1234", "oauth": "" },
//!     "directory": { "client_id": "..." },
//!     "log_dir": "logs"
//! }
//! ```
//!
//! Every section and field is optional and falls back to its default.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::directory::DirectoryConfig;
use crate::error::{Error, Result};
use crate::logger::LoggerConfig;
use crate::twitch::TwitchConfig;

/// Top-level daemon settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Core logger settings
    pub logger: LoggerConfig,

    /// Twitch IRC client settings
    pub twitch: TwitchConfig,

    /// Channel-existence lookup settings
    pub directory: DirectoryConfig,

    /// Root directory of the chat log files
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logger: LoggerConfig::default(),
            twitch: TwitchConfig::default(),
            directory: DirectoryConfig::default(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Settings {
    /// Parse settings from JSON text
    pub fn from_json(data: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(data)?;
        settings.logger.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&data)
    }
}

/// Serde helper for durations written as (fractional) seconds
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
