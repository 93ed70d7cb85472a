use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use taskdesk_client::ClientConfig;
use taskdesk_client::config::DEFAULT_API_URL;
use url::Url;

use crate::cli::OutputFormat;
use crate::error::{CliError, Result};

const APP_DIR: &str = "taskdesk";
const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    /// Where the session is stored; defaults to the platform data directory.
    pub credentials_path: Option<PathBuf>,
    pub output: OutputFormat,
    pub colored: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
            credentials_path: None,
            output: OutputFormat::Pretty,
            colored: true,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or_else(|| CliError::Config("cannot determine the config directory".into()))
    }

    /// Load the configuration, falling back to defaults when the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.show()?)?;
        Ok(())
    }

    pub fn reset(path: Option<&Path>) -> Result<()> {
        Self::default().save(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn credentials_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials_path {
            return Ok(path.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join(APP_DIR).join(SESSION_FILE))
            .ok_or_else(|| CliError::Config("cannot determine the data directory".into()))
    }

    /// Build the client configuration. Command-line values win over the file.
    pub fn client_config(
        &self,
        api_url: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Result<ClientConfig> {
        let raw = api_url.unwrap_or(&self.api_url);
        let base_url = Url::parse(raw).map_err(|e| CliError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let mut config = ClientConfig::from_env();
        config.base_url = base_url;
        config.timeout = Duration::from_secs(timeout_secs.unwrap_or(self.timeout_secs));
        Ok(config)
    }
}
