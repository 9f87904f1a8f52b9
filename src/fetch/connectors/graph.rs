// src/fetch/connectors/graph.rs
//! Meta Graph API plumbing shared by the Facebook and Instagram connectors.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::fetch::connectors::excerpt;
use crate::fetch::types::FetchError;

pub const GRAPH_BASE: &str = "https://graph.facebook.com/v21.0";

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

/// Graph reports most failures as HTTP 400 with an error code; map the code to a kind.
pub(crate) fn classify(code: i64, message: &str) -> FetchError {
    let msg = format!("graph error {code}: {message}");
    match code {
        190 | 102 | 10 | 200 => FetchError::Unauthorized(msg),
        4 | 17 | 32 | 613 => FetchError::RateLimited(msg),
        100 | 803 => FetchError::NotFound(msg),
        1 | 2 => FetchError::Transient(msg),
        _ => FetchError::Upstream(msg),
    }
}

pub(crate) async fn get<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, FetchError> {
    let resp = req.send().await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        if let Ok(env) = serde_json::from_slice::<GraphErrorEnvelope>(&bytes) {
            return Err(classify(env.error.code, &env.error.message));
        }
        let body = String::from_utf8_lossy(&bytes);
        return Err(FetchError::from_status(status, excerpt(&body, 200)));
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| FetchError::Upstream(format!("malformed graph response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_kinds() {
        assert!(matches!(classify(190, "expired"), FetchError::Unauthorized(_)));
        assert!(matches!(classify(100, "no node"), FetchError::NotFound(_)));
        assert!(classify(17, "too many").is_retryable());
        assert!(matches!(classify(9999, "?"), FetchError::Upstream(_)));
    }
}
