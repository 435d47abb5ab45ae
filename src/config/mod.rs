use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Portal used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "https://api.cloud.portaljs.com/";

/// Upper bound on a single catalog call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_USER_AGENT: &str = concat!("ckan-explorer/", env!("CARGO_PKG_VERSION"));

/// Connection settings handed to a client at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<base>/api/3/action/<action>`, tolerant of a trailing slash on the base
    pub fn action_url(&self, action: &str) -> String {
        format!(
            "{}/api/3/action/{}",
            self.base_url.trim_end_matches('/'),
            action
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// On-disk configuration (`~/.config/ckan/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSection {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Organization shown by `ckan my` when none is given
    #[serde(default)]
    pub default_org: Option<String>,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: default_timeout_secs(),
            default_org: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Config {
    /// Load the config file if present, then apply `CKAN_URL` and
    /// `CKAN_TIMEOUT_SECS` from the environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ckan").join("config.toml"))
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CKAN_URL").filter(|u| !u.trim().is_empty()) {
            self.catalog.url = url.trim().to_string();
        }
        if let Some(secs) = lookup("CKAN_TIMEOUT_SECS") {
            self.catalog.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("CKAN_TIMEOUT_SECS is not a number: {}", secs))?;
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.catalog.url.clone())
            .with_timeout(Duration::from_secs(self.catalog.timeout_secs))
    }
}
