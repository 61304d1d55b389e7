//! Server configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_path: PathBuf,
    /// HS256 signing secret. Empty means a random per-process secret.
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub max_payload_size: usize,
    /// Build date reported by `/version`, as `YYYY-MM-DD`.
    pub build_date: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            database_path: PathBuf::from("lockbox.db"),
            jwt_secret: String::new(),
            token_ttl_secs: 3600,
            max_payload_size: 8 * 1024 * 1024,
            build_date: None,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_ttl_secs == 0 {
            anyhow::bail!("token_ttl_secs must be positive");
        }
        if self.max_payload_size == 0 {
            anyhow::bail!("max_payload_size must be positive");
        }
        self.parsed_build_date()?;
        Ok(())
    }

    pub fn parsed_build_date(&self) -> anyhow::Result<Option<NaiveDate>> {
        self.build_date
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|e| anyhow::anyhow!("invalid build_date {:?}: {}", d, e))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.token_ttl_secs, 3600);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            listen_addr = "0.0.0.0:9000"
            build_date = "2024-05-01"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.database_path, PathBuf::from("lockbox.db"));
        assert_eq!(
            config.parsed_build_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
    }

    #[test]
    fn bad_build_date_rejected() {
        let config = ServerConfig {
            build_date: Some("01/05/2024".to_string()),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
