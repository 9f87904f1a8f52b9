// src/fetch/connectors/mod.rs
//! Built-in source connectors plus the HTTP helpers they share.

pub mod exif_geo;
pub mod facebook;
pub mod google_dork;
pub mod graph;
pub mod hibp;
pub mod instagram;
pub mod reddit;
pub mod twitter;

use std::sync::Arc;

use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::fetch::types::{Connector, FetchError};

pub use exif_geo::ExifGeoConnector;
pub use facebook::FacebookConnector;
pub use google_dork::GoogleDorkConnector;
pub use hibp::HibpConnector;
pub use instagram::InstagramConnector;
pub use reddit::RedditConnector;
pub use twitter::TwitterConnector;

/// One instance of every built-in connector.
pub fn builtin() -> Vec<Arc<dyn Connector>> {
    vec![
        Arc::new(InstagramConnector::default()),
        Arc::new(TwitterConnector::default()),
        Arc::new(FacebookConnector::default()),
        Arc::new(RedditConnector::default()),
        Arc::new(GoogleDorkConnector::default()),
        Arc::new(HibpConnector::default()),
        Arc::new(ExifGeoConnector::default()),
    ]
}

/// Send and decode a JSON body; non-2xx statuses are classified via `FetchError::from_status`.
pub(crate) async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, FetchError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::from_status(status, excerpt(&body, 200)));
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| FetchError::Upstream(format!("malformed response: {e}")))
}

/// First `max` chars on a single line, for error messages.
pub(crate) fn excerpt(s: &str, max: usize) -> String {
    let one_line: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() > max {
        let mut out: String = one_line.chars().take(max).collect();
        out.push('…');
        out
    } else {
        one_line
    }
}

/// `base` plus percent-encoded path segments, so a target can never change the endpoint.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, FetchError> {
    let mut url =
        Url::parse(base).map_err(|e| FetchError::Upstream(format!("bad endpoint {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| FetchError::Upstream(format!("endpoint {base} cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Strip a leading `@` and surrounding whitespace from a handle.
pub(crate) fn handle(target: &str) -> &str {
    target.trim().trim_start_matches('@')
}
