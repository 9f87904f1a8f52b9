// src/transport.rs
//! Network client factory shared read-only by every connector in a run.
//!
//! With `use_proxy` the client routes everything through the configured proxy and must
//! pass a self-check against `check_url` before it is handed out. A failed check is a
//! hard error; there is no silent fallback to a direct connection.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::run::TransportConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build http client: {0}")]
    Build(String),
    #[error("invalid proxy url {url}: {reason}")]
    InvalidProxy { url: String, reason: String },
    #[error("proxy self-check against {check_url} failed: {reason}")]
    ProxyCheckFailed { check_url: String, reason: String },
}

/// A configured client. Cloning is cheap (the inner client is reference counted).
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    proxied: bool,
}

impl Transport {
    /// Direct client with the given timeout; used by tests and as the non-proxy path.
    pub fn direct(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self {
            client,
            proxied: false,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_proxied(&self) -> bool {
        self.proxied
    }
}

/// Build the run's transport. Proxied transports are verified before returning.
pub async fn build_transport(cfg: &TransportConfig) -> Result<Transport, TransportError> {
    let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
    let mut builder = Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .timeout(timeout);

    if cfg.use_proxy {
        let proxy =
            reqwest::Proxy::all(cfg.proxy_url.as_str()).map_err(|e| TransportError::InvalidProxy {
                url: cfg.proxy_url.clone(),
                reason: e.to_string(),
            })?;
        builder = builder.proxy(proxy);
    } else {
        builder = builder.no_proxy();
    }

    let client = builder
        .build()
        .map_err(|e| TransportError::Build(e.to_string()))?;
    let transport = Transport {
        client,
        proxied: cfg.use_proxy,
    };

    if cfg.use_proxy {
        verify_proxy(&transport, &cfg.check_url).await?;
        tracing::info!(check_url = %cfg.check_url, "proxy self-check passed");
    }
    Ok(transport)
}

#[derive(Debug, Deserialize)]
struct ProxyCheck {
    #[serde(rename = "IsTor")]
    is_tor: bool,
    #[serde(rename = "IP", default)]
    ip: Option<String>,
}

/// Ask the verification endpoint whether traffic arrives through the anonymizing network.
pub async fn verify_proxy(transport: &Transport, check_url: &str) -> Result<(), TransportError> {
    let fail = |reason: String| TransportError::ProxyCheckFailed {
        check_url: check_url.to_string(),
        reason,
    };

    let resp = transport
        .client
        .get(check_url)
        .send()
        .await
        .map_err(|e| fail(e.to_string()))?;
    let resp = resp.error_for_status().map_err(|e| fail(e.to_string()))?;
    let body: ProxyCheck = resp
        .json()
        .await
        .map_err(|e| fail(format!("unexpected check response: {e}")))?;

    if body.is_tor {
        tracing::debug!(exit_ip = body.ip.as_deref().unwrap_or("?"), "proxy exit confirmed");
        Ok(())
    } else {
        Err(fail("traffic is not routed through the proxy".to_string()))
    }
}
