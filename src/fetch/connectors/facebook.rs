use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fetch::connectors::endpoint;
use crate::fetch::connectors::graph::{self, GRAPH_BASE};
use crate::fetch::types::{Connector, FetchContext, FetchError, Fetched, SourceKind};

const FEED_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    data: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    created_time: Option<String>,
}

/// Public profile/page and its recent feed through the Graph API.
/// The target is a page id/name; an empty target (or `me`) queries the token's owner.
#[derive(Debug, Default)]
pub struct FacebookConnector;

impl FacebookConnector {
    pub fn parse(profile_body: &str, feed_body: &str) -> Result<Fetched, FetchError> {
        let profile: Value = serde_json::from_str(profile_body)
            .map_err(|e| FetchError::Upstream(format!("malformed profile: {e}")))?;
        let feed: Feed = serde_json::from_str(feed_body)
            .map_err(|e| FetchError::Upstream(format!("malformed feed: {e}")))?;
        Ok(Self::shape(profile, feed))
    }

    fn shape(profile: Value, feed: Feed) -> Fetched {
        let posts: Vec<Value> = feed
            .data
            .into_iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "message": p.message.unwrap_or_default(),
                    "created_time": p.created_time,
                })
            })
            .collect();
        let name = profile
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        let summary = format!("Facebook user/page {name} • {} recent posts", posts.len());
        Fetched::new(json!({ "profile": profile, "recent_posts": posts }), summary)
    }
}

#[async_trait]
impl Connector for FacebookConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Facebook
    }

    async fn fetch(&self, target: &str, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        let creds = ctx.credentials.require(
            &SourceKind::Facebook,
            &["access_token"],
            "no access_token",
        )?;
        let token = &creds[0];
        let node = match target.trim() {
            "" => "me",
            t => t,
        };
        let http = ctx.transport.client();

        let profile: Value = graph::get(
            http.get(endpoint(GRAPH_BASE, &[node])?)
                .query(&[("access_token", token.as_str()), ("fields", "id,name")]),
        )
        .await?;
        let id = profile
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Upstream("profile without id".into()))?
            .to_string();

        let feed: Feed = graph::get(
            http.get(endpoint(GRAPH_BASE, &[id.as_str(), "feed"])?)
                .query(&[
                    ("access_token", token.as_str()),
                    ("fields", "message,created_time,id"),
                ])
                .query(&[("limit", FEED_LIMIT)]),
        )
        .await?;

        Ok(Self::shape(profile, feed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_posts_without_message_become_empty_strings() {
        let f = FacebookConnector::parse(
            r#"{"id":"9","name":"Some Page"}"#,
            r#"{"data":[{"id":"9_1","message":"Great day!","created_time":"2024-01-01T00:00:00+0000"},{"id":"9_2"}]}"#,
        )
        .unwrap();
        assert_eq!(f.summary, "Facebook user/page Some Page • 2 recent posts");
        assert_eq!(f.raw["recent_posts"][1]["message"], "");
        assert_eq!(f.raw["profile"]["id"], "9");
    }
}
