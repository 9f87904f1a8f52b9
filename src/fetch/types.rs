// src/fetch/types.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::credentials::Credentials;
use crate::fetch::retry::RetryPolicy;
use crate::transport::Transport;

/// Known source kinds. `Custom` carries registered extensions and ids nobody registered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SourceKind {
    Instagram,
    Twitter,
    Facebook,
    Reddit,
    GoogleDork,
    HibpEmail,
    ExifImageGeo,
    Custom(String),
}

impl SourceKind {
    pub const BUILTIN: [SourceKind; 7] = [
        SourceKind::Instagram,
        SourceKind::Twitter,
        SourceKind::Facebook,
        SourceKind::Reddit,
        SourceKind::GoogleDork,
        SourceKind::HibpEmail,
        SourceKind::ExifImageGeo,
    ];

    /// Wire id, also the credentials section name.
    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::Instagram => "instagram",
            SourceKind::Twitter => "twitter",
            SourceKind::Facebook => "facebook",
            SourceKind::Reddit => "reddit",
            SourceKind::GoogleDork => "google_dork",
            SourceKind::HibpEmail => "hibp_email",
            SourceKind::ExifImageGeo => "exif_image_geo",
            SourceKind::Custom(id) => id.as_str(),
        }
    }

    /// Human-facing name used in summaries ("Google Dork", "Reddit").
    pub fn display_name(&self) -> String {
        self.as_str()
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut cs = w.chars();
                match cs.next() {
                    Some(first) => first.to_uppercase().chain(cs).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase();
        let known = SourceKind::BUILTIN
            .iter()
            .find(|k| k.as_str() == id)
            .cloned();
        Ok(known.unwrap_or(SourceKind::Custom(id)))
    }
}

impl From<String> for SourceKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(k) => k,
            Err(never) => match never {},
        }
    }
}

impl From<SourceKind> for String {
    fn from(k: SourceKind) -> Self {
        k.as_str().to_string()
    }
}

/// One unit of work: query `source` about `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRequest {
    pub source: SourceKind,
    pub target: String,
}

impl SourceRequest {
    pub fn new(source: SourceKind, target: impl Into<String>) -> Self {
        Self {
            source,
            target: target.into(),
        }
    }

    /// Parse `source=target` (as typed on the command line).
    pub fn parse_pair(pair: &str) -> Option<Self> {
        let (source, target) = pair.split_once('=')?;
        let target = target.trim();
        if source.trim().is_empty() || target.is_empty() {
            return None;
        }
        let source: SourceKind = source.parse().ok()?;
        Some(Self::new(source, target))
    }
}

/// Mean polarity scores attached by the enrichment pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sentiment {
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
    /// Normalized to [-1, 1].
    pub compound: f64,
}

/// Outcome of one `(source, target)` fetch. `raw` is `None` exactly when the fetch failed
/// or produced nothing; `summary` is always set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub raw: Option<Value>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl SourceResult {
    pub fn success(raw: Value, summary: impl Into<String>) -> Self {
        Self {
            raw: Some(raw),
            summary: summary.into(),
            sentiment: None,
        }
    }

    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            raw: None,
            summary: summary.into(),
            sentiment: None,
        }
    }

    /// Failure-shaped result for a classified connector error.
    pub fn from_error(source: &SourceKind, err: &FetchError) -> Self {
        let name = source.display_name();
        match err {
            FetchError::MissingCredentials(detail) => {
                Self::failure(format!("{name} skipped ({detail})"))
            }
            other => Self::failure(format!("{name} error: {other}")),
        }
    }

    pub fn is_success(&self) -> bool {
        self.raw.is_some()
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }
}

/// Successful connector payload before it becomes a `SourceResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub raw: Value,
    pub summary: String,
}

impl Fetched {
    pub fn new(raw: Value, summary: impl Into<String>) -> Self {
        Self {
            raw,
            summary: summary.into(),
        }
    }
}

impl From<Fetched> for SourceResult {
    fn from(f: Fetched) -> Self {
        SourceResult::success(f.raw, f.summary)
    }
}

/// Classified connector failure. Only `Transient`, `RateLimited` and `Timeout` are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{0}")]
    MissingCredentials(String),
    #[error("transient network failure: {0}")]
    Transient(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("authentication rejected: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Upstream(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transient(_) | FetchError::RateLimited(_) | FetchError::Timeout(_)
        )
    }

    /// Short label for logs/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::MissingCredentials(_) => "config_incomplete",
            FetchError::Transient(_) => "transient",
            FetchError::RateLimited(_) => "rate_limited",
            FetchError::Timeout(_) => "timeout",
            FetchError::NotFound(_) => "not_found",
            FetchError::Unauthorized(_) => "unauthorized",
            FetchError::Upstream(_) => "upstream",
        }
    }

    /// Map an HTTP status (plus a short body excerpt) to a failure kind.
    pub fn from_status(status: reqwest::StatusCode, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let msg = if detail.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {detail}")
        };
        match status.as_u16() {
            401 | 403 => FetchError::Unauthorized(msg),
            404 | 410 => FetchError::NotFound(msg),
            408 => FetchError::Transient(msg),
            429 => FetchError::RateLimited(msg),
            s if s >= 500 => FetchError::Transient(msg),
            _ => FetchError::Upstream(msg),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return FetchError::from_status(status, String::new());
        }
        if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            FetchError::Transient(e.to_string())
        } else {
            FetchError::Upstream(e.to_string())
        }
    }
}

/// Everything a connector may read during one call. Shared read-only across tasks.
pub struct FetchContext<'a> {
    pub credentials: &'a Credentials,
    pub transport: &'a Transport,
    /// Policy for connectors that retry their own sub-calls.
    pub retry: &'a RetryPolicy,
}

/// A single source implementation. Terminal conditions (missing credentials, unknown
/// target, rejected auth) are returned as the matching `FetchError`; transient ones are
/// left for the retry wrapper.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(&self, target: &str, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError>;
}
