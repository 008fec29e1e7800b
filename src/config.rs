//! Config module.
//! Manages I/O for config.json (IYUU endpoint, token, site store path, timeout).
//! Uses serde for JSON serialization.
//! Falls back to defaults when the file is missing; `IYUU_TOKEN` and
//! `IYUU_BASE_URL` from the environment override whatever the file says.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_BASE_URL: &str = "https://api.iyuu.cn";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub recommend_sites: String,
    pub bind: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            recommend_sites: "/reseed/sites/recommend".to_string(),
            bind: "/reseed/users/bind".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    /// IYUU token; usually supplied through `IYUU_TOKEN`
    pub token: Option<String>,
    /// JSON array of site records
    pub sites_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: Endpoints::default(),
            token: None,
            sites_path: PathBuf::from("sites.json"),
            timeout_secs: 5,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the defaults if it does not exist, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: AppConfig = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            debug!(path = %path.display(), "loaded config");
            config
        } else {
            info!(path = %path.display(), "config file not found, using defaults");
            AppConfig::default()
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies `IYUU_TOKEN` / `IYUU_BASE_URL` as returned by `lookup`. Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(token) = present("IYUU_TOKEN") {
            self.token = Some(token);
        }
        if let Some(base_url) = present("IYUU_BASE_URL") {
            self.base_url = base_url;
        }
        self
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, raw).with_context(|| format!("Failed to write config: {}", path.display()))
    }

    pub fn recommend_sites_url(&self) -> String {
        join_url(&self.base_url, &self.endpoints.recommend_sites)
    }

    pub fn bind_url(&self) -> String {
        join_url(&self.base_url, &self.endpoints.bind)
    }
}

fn join_url(base: &str, endpoint: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), endpoint.trim_start_matches('/'))
}
