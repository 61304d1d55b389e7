//! Client configuration.

use crate::sync::SchedulerOptions;
use crate::{LockboxError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    /// Directory holding one encrypted store per account.
    pub data_dir: PathBuf,
    pub sync_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub cycle_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("lockbox-data"),
            sync_interval_secs: 10,
            request_timeout_secs: 5,
            cycle_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LockboxError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| LockboxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(LockboxError::Config("server_url is empty".to_string()));
        }
        if self.sync_interval_secs == 0 {
            return Err(LockboxError::Config(
                "sync_interval_secs must be positive".to_string(),
            ));
        }
        // A request must be able to fail before the next periodic tick.
        if self.request_timeout_secs == 0 || self.request_timeout_secs >= 10 {
            return Err(LockboxError::Config(
                "request_timeout_secs must be between 1 and 9".to_string(),
            ));
        }
        if self.cycle_timeout_secs < self.request_timeout_secs {
            return Err(LockboxError::Config(
                "cycle_timeout_secs must not be shorter than request_timeout_secs".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            interval: Duration::from_secs(self.sync_interval_secs),
            cycle_timeout: Duration::from_secs(self.cycle_timeout_secs),
        }
    }

    /// HTTP gateway to the configured server.
    #[cfg(feature = "http")]
    pub fn gateway(&self, session: crate::Session) -> Result<crate::HttpGateway> {
        crate::HttpGateway::with_timeout(&self.server_url, session, self.request_timeout())
    }
}
