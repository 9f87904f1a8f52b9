// src/config/credentials.rs
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::types::{FetchError, SourceKind};

pub const ENV_CREDENTIALS_PATH: &str = "OSINT_CREDENTIALS";
pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";

/// Per-source credential sections, keyed by source id. An absent section means
/// "skip this source", never "fail the run".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    sections: Map<String, Value>,
}

impl Credentials {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Object(sections) => Ok(Self { sections }),
            other => Err(anyhow!(
                "credentials must be a JSON object keyed by source, got {}",
                json_type(&other)
            )),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let v: Value = serde_json::from_str(s).context("parsing credentials json")?;
        Self::from_value(v)
    }

    /// Strict load: missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading credentials from {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("credentials file {}", path.display()))
    }

    /// Resolution:
    /// 1) $OSINT_CREDENTIALS (must exist)
    /// 2) ./credentials.json
    /// 3) empty bundle
    ///
    /// A malformed default file is logged and treated as empty.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CREDENTIALS_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CREDENTIALS_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CREDENTIALS_PATH);
        if !default.exists() {
            tracing::warn!(
                path = DEFAULT_CREDENTIALS_PATH,
                "credentials file not found; credentialed sources will be skipped"
            );
            return Ok(Self::empty());
        }
        match Self::load_from(&default) {
            Ok(c) => Ok(c),
            Err(e) => {
                tracing::warn!(error = ?e, "malformed credentials file; continuing without credentials");
                Ok(Self::empty())
            }
        }
    }

    pub fn insert(&mut self, source: &SourceKind, section: Value) {
        self.sections.insert(source.as_str().to_string(), section);
    }

    pub fn section(&self, source: &SourceKind) -> Option<&Value> {
        self.sections.get(source.as_str())
    }

    pub fn configured_sources(&self) -> Vec<SourceKind> {
        self.sections
            .keys()
            .map(|k| SourceKind::from(k.clone()))
            .collect()
    }

    /// Fetch the listed string fields from a source's section. Any absent or blank field
    /// yields `FetchError::MissingCredentials` with `reason`.
    pub fn require(
        &self,
        source: &SourceKind,
        fields: &[&str],
        reason: &str,
    ) -> Result<Vec<String>, FetchError> {
        let section = self
            .section(source)
            .ok_or_else(|| FetchError::MissingCredentials(reason.to_string()))?;
        fields
            .iter()
            .map(|f| {
                section
                    .get(*f)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| FetchError::MissingCredentials(reason.to_string()))
            })
            .collect()
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
