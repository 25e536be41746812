//! Configuration management for StreamDebrid
//!
//! Handles config file loading and debrid credentials.
//! Config is stored at ~/.config/streamdebrid/config.toml

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::debrid::poll::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_DELAY};
use crate::debrid::{Credentials, DebridProvider, Hybrid, PollPolicy, ProviderKind, RealDebrid, Torbox};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which provider to use
    pub provider: ProviderKind,
    /// API key for single-provider modes
    pub debrid_api_key: Option<String>,
    /// Real-Debrid key for hybrid mode
    pub rd_api_key: Option<String>,
    /// Torbox key for hybrid mode
    pub tb_api_key: Option<String>,
    /// Client IP forwarded to providers
    pub ip: Option<String>,
    pub poll_attempts: u32,
    pub poll_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            debrid_api_key: None,
            rd_api_key: None,
            tb_api_key: None,
            ip: None,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_delay_ms: DEFAULT_POLL_DELAY.as_millis() as u64,
        }
    }
}

impl Config {
    /// Get config file path (~/.config/streamdebrid/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamdebrid").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .map(|p| Self::load_or_default(&p))
            .unwrap_or_default()
    }

    /// Load `path` if it exists; an unreadable or malformed file is logged and ignored
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %format!("{:#}", e),
                    "ignoring config file, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Override file values with environment variables:
    /// `DEBRID_API_KEY`, `RD_API_KEY`, `TB_API_KEY`, `DEBRID_IP`
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let set = |target: &mut Option<String>, name: &str| {
            if let Some(value) = var(name).filter(|v| !v.is_empty()) {
                *target = Some(value);
            }
        };
        set(&mut self.debrid_api_key, "DEBRID_API_KEY");
        set(&mut self.rd_api_key, "RD_API_KEY");
        set(&mut self.tb_api_key, "TB_API_KEY");
        set(&mut self.ip, "DEBRID_IP");
        self
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_attempts, Duration::from_millis(self.poll_delay_ms))
    }

    fn credentials(&self, key: &Option<String>, field: &str) -> Result<Credentials> {
        let Some(key) = key.as_deref().filter(|k| !k.trim().is_empty()) else {
            bail!("Missing {} for provider '{}'", field, self.provider);
        };
        let credentials = Credentials::new(key.trim());
        Ok(match &self.ip {
            Some(ip) => credentials.with_ip(ip.clone()),
            None => credentials,
        })
    }

    /// Build the configured provider
    pub fn build_provider(&self) -> Result<Box<dyn DebridProvider>> {
        let poll = self.poll_policy();

        Ok(match self.provider {
            ProviderKind::RealDebrid => {
                let credentials = self.credentials(&self.debrid_api_key, "debrid_api_key")?;
                Box::new(RealDebrid::new(credentials).with_poll_policy(poll))
            }
            ProviderKind::Torbox => {
                let credentials = self.credentials(&self.debrid_api_key, "debrid_api_key")?;
                Box::new(Torbox::new(credentials).with_poll_policy(poll))
            }
            ProviderKind::Hybrid => {
                let rd = self.credentials(&self.rd_api_key, "rd_api_key")?;
                let tb = self.credentials(&self.tb_api_key, "tb_api_key")?;
                Box::new(Hybrid::realdebrid_torbox(rd, tb, poll))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.provider, ProviderKind::Hybrid);
        assert!(config.debrid_api_key.is_none());
        assert_eq!(config.poll_policy(), PollPolicy::default());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            provider = "torbox"
            debrid_api_key = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Torbox);
        assert_eq!(config.debrid_api_key.as_deref(), Some("abc"));
        assert_eq!(config.poll_attempts, 5);
        assert_eq!(config.poll_delay_ms, 1000);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let vars: HashMap<&str, &str> = [("TB_API_KEY", "from-env"), ("RD_API_KEY", "")].into();
        let config = Config {
            rd_api_key: Some("from-file".into()),
            ..Config::default()
        }
        .with_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.tb_api_key.as_deref(), Some("from-env"));
        assert_eq!(config.rd_api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_build_provider_requires_keys() {
        let config = Config {
            provider: ProviderKind::Hybrid,
            rd_api_key: Some("rd".into()),
            ..Config::default()
        };
        let err = config.build_provider().unwrap_err();
        assert!(err.to_string().contains("tb_api_key"));

        let config = Config {
            provider: ProviderKind::Torbox,
            debrid_api_key: Some("   ".into()),
            ..Config::default()
        };
        assert!(config.build_provider().is_err());
    }

    #[test]
    fn test_build_provider_kinds() {
        let config = Config {
            provider: ProviderKind::RealDebrid,
            debrid_api_key: Some("key".into()),
            ip: Some("10.0.0.1".into()),
            ..Config::default()
        };
        assert_eq!(config.build_provider().unwrap().descriptor().id, "realdebrid");

        let config = Config {
            provider: ProviderKind::Hybrid,
            rd_api_key: Some("rd".into()),
            tb_api_key: Some("tb".into()),
            ..Config::default()
        };
        assert_eq!(config.build_provider().unwrap().descriptor().id, "hybrid");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = \"realdebrid\"\ndebrid_api_key = \"key\"\npoll_attempts = 3\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider, ProviderKind::RealDebrid);
        assert_eq!(loaded.poll_attempts, 3);
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_load_or_default_ignores_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = [not toml").unwrap();

        assert!(Config::load_from(&path).is_err());
        let config = Config::load_or_default(&path);
        assert_eq!(config.provider, ProviderKind::Hybrid);
        assert_eq!(config.poll_attempts, 5);

        let missing = Config::load_or_default(&dir.path().join("missing.toml"));
        assert!(missing.rd_api_key.is_none());
    }
}
