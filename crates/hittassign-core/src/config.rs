//! Persistent configuration for hittassign.
//!
//! Stores user settings in `~/.hittassign/config.json`. Every field has a
//! default, so a missing or partial file is never an error.
//!
//! # Example
//!
//! ```no_run
//! use hittassign_core::config::HittassignConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = HittassignConfig::load();
//! println!("running up to {} tasks at once", config.concurrency);
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

/// Concurrency bound of the root scope when nothing else is configured.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(n) => n,
    None => panic!("default concurrency must be positive"),
};

/// Returns `~/.hittassign`, or `None` when the home directory is unknown.
pub fn hittassign_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hittassign"))
}

fn default_concurrency() -> NonZeroUsize {
    DEFAULT_CONCURRENCY
}

fn default_user_agent() -> String {
    format!("hittassign/{}", env!("CARGO_PKG_VERSION"))
}

/// Persistent hittassign configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HittassignConfig {
    /// Concurrency bound of the root scope. `concurrently` blocks override it
    /// for their own bodies.
    #[serde(default = "default_concurrency")]
    pub concurrency: NonZeroUsize,

    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout. Requests never time out when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for HittassignConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
            timeout_secs: None,
        }
    }
}

impl HittassignConfig {
    /// Load config from `~/.hittassign/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        hittassign_dir()
            .and_then(|dir| std::fs::read_to_string(dir.join(CONFIG_FILENAME)).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.hittassign/config.json`, creating the directory.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = hittassign_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "home directory is unknown")
        })?;
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(dir.join(CONFIG_FILENAME), json)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
