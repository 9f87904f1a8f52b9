// src/config/run.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::retry::RetryPolicy;

pub const ENV_RUN_CONFIG_PATH: &str = "OSINT_RUN_CONFIG";
pub const ENV_USE_PROXY: &str = "OSINT_USE_PROXY";
pub const DEFAULT_RUN_CONFIG_PATH: &str = "config/run.toml";

fn default_max_workers() -> usize {
    8
}
fn default_task_timeout_secs() -> u64 {
    60
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_proxy_url() -> String {
    "socks5h://127.0.0.1:9050".to_string()
}
fn default_check_url() -> String {
    "https://check.torproject.org/api/ip".to_string()
}
fn default_transport_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    concat!("profile-aggregator/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Network client settings. The proxy is only used when `use_proxy` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub use_proxy: bool,
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    /// Endpoint answering `{"IsTor": bool, ...}` used for the proxy self-check.
    #[serde(default = "default_check_url")]
    pub check_url: String,
    #[serde(default = "default_transport_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            use_proxy: false,
            proxy_url: default_proxy_url(),
            check_url: default_check_url(),
            timeout_secs: default_transport_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Per-request deadline; 0 disables it.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            task_timeout_secs: default_task_timeout_secs(),
            output_dir: default_output_dir(),
            retry: RetryPolicy::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: RunConfig = toml::from_str(s).context("parsing run config toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading run config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolution:
    /// 1) $OSINT_RUN_CONFIG (must exist)
    /// 2) config/run.toml
    /// 3) defaults
    ///
    /// `$OSINT_USE_PROXY` (1/0, true/false) overrides `transport.use_proxy` afterwards.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_RUN_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_RUN_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_RUN_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                Self::default()
            }
        };
        if let Some(on) = parse_bool_env(std::env::var(ENV_USE_PROXY).ok()) {
            cfg.transport.use_proxy = on;
        }
        Ok(cfg)
    }

    pub fn sanitized(mut self) -> Self {
        self.max_workers = self.max_workers.max(1);
        self.retry = self.retry.sanitized();
        self.transport.timeout_secs = self.transport.timeout_secs.max(1);
        self
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs))
    }
}

fn parse_bool_env(raw: Option<String>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
