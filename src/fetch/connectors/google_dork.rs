use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::fetch::connectors::send_json;
use crate::fetch::retry::retry;
use crate::fetch::types::{Connector, FetchContext, FetchError, Fetched, SourceKind};

const SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
const RESULTS_PER_QUERY: u32 = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    link: String,
}

/// Runs a fixed set of dork queries through the Custom Search JSON API.
/// Each query is retried on its own; a failed query is recorded as an error string
/// under its key instead of failing the whole source.
#[derive(Debug, Default)]
pub struct GoogleDorkConnector;

impl GoogleDorkConnector {
    pub fn queries(target: &str) -> Vec<String> {
        let t = target.trim();
        vec![
            format!("site:facebook.com \"{t}\""),
            format!("site:linkedin.com \"{t}\""),
            format!("site:pastebin.com \"{t}\""),
            format!("\"{t}\" email"),
        ]
    }

    /// Assemble the per-query map and summary.
    pub fn collect(per_query: Vec<(String, Result<Vec<String>, FetchError>)>) -> Fetched {
        let total_queries = per_query.len();
        let mut links = 0usize;
        let mut failed = 0usize;
        let mut out = Map::new();
        for (q, res) in per_query {
            let v = match res {
                Ok(urls) => {
                    links += urls.len();
                    Value::from(urls)
                }
                Err(e) => {
                    failed += 1;
                    Value::from(format!("Error during search: {e}"))
                }
            };
            out.insert(q, v);
        }
        let mut summary = format!("Google Dork: {links} links across {total_queries} queries");
        if failed > 0 {
            summary.push_str(&format!(" ({failed} failed)"));
        }
        Fetched::new(Value::Object(out), summary)
    }
}

#[async_trait]
impl Connector for GoogleDorkConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::GoogleDork
    }

    async fn fetch(&self, target: &str, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        let creds = ctx.credentials.require(
            &SourceKind::GoogleDork,
            &["api_key", "cx"],
            "no api_key/cx",
        )?;
        let (key, cx) = (&creds[0], &creds[1]);
        let http = ctx.transport.client();

        let mut per_query = Vec::new();
        for q in Self::queries(target) {
            let query = q.as_str();
            let res = retry(ctx.retry, "google_dork.query", || async move {
                let resp: SearchResponse = send_json(
                    http.get(SEARCH_URL)
                        .query(&[("key", key.as_str()), ("cx", cx.as_str()), ("q", query)])
                        .query(&[("num", RESULTS_PER_QUERY)]),
                )
                .await?;
                Ok::<_, FetchError>(resp.items.into_iter().map(|i| i.link).collect::<Vec<_>>())
            })
            .await;
            // A rejected key fails every query the same way.
            if let Err(FetchError::Unauthorized(msg)) = &res {
                return Err(FetchError::Unauthorized(msg.clone()));
            }
            per_query.push((q, res));
        }
        Ok(Self::collect(per_query))
    }
}
