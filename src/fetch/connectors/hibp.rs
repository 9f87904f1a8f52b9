use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fetch::connectors::{endpoint, excerpt};
use crate::fetch::types::{Connector, FetchContext, FetchError, Fetched, SourceKind};

const API_BASE: &str = "https://haveibeenpwned.com/api/v3";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Breach {
    name: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    breach_date: Option<String>,
    #[serde(default)]
    data_classes: Vec<String>,
}

/// Breached-account lookup for an email address. A 404 from the API means
/// "not in any breach", which is a successful, empty result.
#[derive(Debug, Default)]
pub struct HibpConnector;

impl HibpConnector {
    pub fn parse(body: &str, email: &str) -> Result<Fetched, FetchError> {
        let breaches: Vec<Breach> = serde_json::from_str(body)
            .map_err(|e| FetchError::Upstream(format!("malformed breach list: {e}")))?;
        Ok(Self::shape(breaches, email))
    }

    fn shape(breaches: Vec<Breach>, email: &str) -> Fetched {
        let list: Vec<Value> = breaches
            .into_iter()
            .map(|b| {
                json!({
                    "name": b.name,
                    "domain": b.domain,
                    "breach_date": b.breach_date,
                    "data_classes": b.data_classes,
                })
            })
            .collect();
        let summary = if list.is_empty() {
            format!("Hibp Email {email}: no known breaches")
        } else {
            format!("Hibp Email {email}: found in {} breaches", list.len())
        };
        Fetched::new(json!({ "email": email, "breaches": list }), summary)
    }
}

#[async_trait]
impl Connector for HibpConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::HibpEmail
    }

    async fn fetch(&self, target: &str, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        let creds =
            ctx.credentials
                .require(&SourceKind::HibpEmail, &["api_key"], "no api_key")?;
        let email = target.trim();
        if !email.contains('@') {
            return Err(FetchError::NotFound(format!("{email} is not an email address")));
        }

        let resp = ctx
            .transport
            .client()
            .get(endpoint(API_BASE, &["breachedaccount", email])?)
            .header("hibp-api-key", creds[0].as_str())
            .query(&[("truncateResponse", "false")])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Self::shape(Vec::new(), email));
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(FetchError::from_status(status, excerpt(&body, 200)));
        }
        Self::parse(&body, email)
    }
}
