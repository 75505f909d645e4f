//! Application configuration management.
//!
//! Holds the backend settings and the last username that logged in
//! successfully. Stored at `~/.config/authgate/config.json`; environment
//! variables override the file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use authgate_core::AuthConfig;
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "authgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_BASE_URL: &str = "AUTHGATE_BASE_URL";
const ENV_USERNAME: &str = "AUTHGATE_USERNAME";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `AUTHGATE_*` overrides from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(std::env::var(ENV_BASE_URL).ok(), std::env::var(ENV_USERNAME).ok());
    }

    fn apply_overrides(&mut self, base_url: Option<String>, username: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.is_empty()) {
            self.auth.base_url = url;
        }
        if let Some(name) = username.filter(|u| !u.is_empty()) {
            self.last_username = Some(name);
        }
    }

    /// Username to pre-fill in the login prompt
    pub fn default_username(&self) -> String {
        self.last_username.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config {
            last_username: Some("alice".to_string()),
            ..Config::default()
        };
        config.apply_overrides(Some("https://app.test".to_string()), Some("bob".to_string()));
        assert_eq!(config.auth.base_url, "https://app.test");
        assert_eq!(config.default_username(), "bob");
    }

    #[test]
    fn test_empty_overrides_are_ignored() {
        let mut config = Config::default();
        let base_url = config.auth.base_url.clone();
        config.apply_overrides(Some(String::new()), None);
        assert_eq!(config.auth.base_url, base_url);
        assert_eq!(config.default_username(), "");
    }

    #[test]
    fn test_config_file_roundtrip_keeps_endpoints() {
        let json = r#"{"auth":{"endpoints":{"logged_user":"/api/me"}},"last_username":"bob"}"#;
        let config: Config = serde_json::from_str(json).expect("parse");
        assert_eq!(config.auth.endpoints.logged_user, "/api/me");
        assert_eq!(config.auth.endpoints.logout, "/api/auth/logout");
        assert_eq!(config.last_username.as_deref(), Some("bob"));
    }
}
