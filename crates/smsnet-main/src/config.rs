// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smsnet_client::{Credentials, DEFAULT_BASE_URL, DEFAULT_TENANT, PortalConfig, normalize_tenant};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const ADDON_OPTIONS_PATH: &str = "/data/options.json";
const DEV_CONFIG_PATHS: [&str; 2] = ["config.toml", "config.json"];

/// Portal account and polling settings
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Portal instance path segment, e.g. "SMSnet"
    #[serde(default = "default_tenant")]
    pub tenant: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Seconds between update cycles (default: 6 hours)
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Per-request transport timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_owned()
}

fn default_update_interval_secs() -> u64 {
    smsnet_coordinator::DEFAULT_UPDATE_INTERVAL.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    smsnet_client::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            tenant: default_tenant(),
            username: String::new(),
            password: String::new(),
            update_interval_secs: default_update_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("update_interval_secs", &self.update_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from an explicit file, add-on options or a dev config file
    ///
    /// Environment variables override whatever source was found.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => Self::discover()?,
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn discover() -> Result<Self> {
        let candidates = std::iter::once(ADDON_OPTIONS_PATH)
            .chain(DEV_CONFIG_PATHS)
            .map(PathBuf::from);

        for path in candidates {
            if path.is_file() {
                return Self::from_file(&path);
            }
        }

        warn!("No configuration file found, using defaults with environment overrides");
        Ok(Self::default())
    }

    /// Parse a TOML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: AppConfig = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        };

        info!("✅ Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `SMSNET_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SMSNET_BASE_URL") {
            self.base_url = url;
        }
        if let Some(tenant) = lookup("SMSNET_TENANT") {
            self.tenant = tenant;
        }
        if let Some(username) = lookup("SMSNET_USERNAME") {
            self.username = username;
        }
        if let Some(password) = lookup("SMSNET_PASSWORD") {
            self.password = password;
        }

        if let Some(interval) = lookup("SMSNET_UPDATE_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => self.update_interval_secs = secs,
                Err(_) => warn!("Ignoring invalid SMSNET_UPDATE_INTERVAL_SECS: {}", interval),
            }
        }
        if let Some(timeout) = lookup("SMSNET_REQUEST_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => warn!("Ignoring invalid SMSNET_REQUEST_TIMEOUT_SECS: {}", timeout),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            anyhow::bail!("base_url must start with http:// or https://");
        }
        if normalize_tenant(&self.tenant).is_empty() {
            anyhow::bail!("tenant cannot be empty");
        }
        if self.username.trim().is_empty() {
            anyhow::bail!("username cannot be empty");
        }
        if self.password.is_empty() {
            anyhow::bail!("password cannot be empty");
        }
        if self.update_interval_secs < 60 {
            anyhow::bail!("update_interval_secs must be at least 60 seconds");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn portal_config(&self) -> PortalConfig {
        PortalConfig::new(
            self.tenant.clone(),
            Credentials::new(self.username.trim(), self.password.clone()),
        )
        .with_base_url(self.base_url.clone())
        .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid() -> AppConfig {
        AppConfig {
            username: "cliente@example.pt".to_owned(),
            password: "segredo".to_owned(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.base_url, "https://www.aquamatrix.pt");
        assert_eq!(config.tenant, "SMSnet");
        assert_eq!(config.update_interval_secs, 21600);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.validate().unwrap_err().to_string().contains("username"));
    }

    #[test]
    fn test_load_toml_file_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "tenant = \"/Aguas/\"\nusername = \"u\"\npassword = \"p\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.tenant, "/Aguas/");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.update_interval_secs, 21600);
        assert_eq!(config.portal_config().unique_id(), "Aguas:u");
    }

    #[test]
    fn test_load_addon_options_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"base_url": "https://portal.example", "username": "u", "password": "p", "request_timeout_secs": 5}}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.base_url, "https://portal.example");
        assert_eq!(config.request_timeout_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "update_interval_secs = \"often\"").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();

        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SMSNET_TENANT", "Outro"),
            ("SMSNET_PASSWORD", "novo"),
            ("SMSNET_UPDATE_INTERVAL_SECS", "3600"),
            ("SMSNET_REQUEST_TIMEOUT_SECS", "soon"),
        ]
        .into_iter()
        .collect();
        let mut config = valid();

        config.apply_overrides(|name| env.get(name).map(|v| (*v).to_owned()));

        assert_eq!(config.tenant, "Outro");
        assert_eq!(config.password, "novo");
        assert_eq!(config.username, "cliente@example.pt");
        assert_eq!(config.update_interval(), Duration::from_secs(3600));
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = valid();
        config.tenant = "//".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("tenant"));

        let mut config = valid();
        config.base_url = "www.aquamatrix.pt".to_owned();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.update_interval_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", valid());
        assert!(!debug.contains("segredo"));
    }
}
