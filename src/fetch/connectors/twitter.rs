use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fetch::connectors::{endpoint, handle, send_json};
use crate::fetch::types::{Connector, FetchContext, FetchError, Fetched, SourceKind};

const API_BASE: &str = "https://api.twitter.com/2";

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TweetsEnvelope {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    public_metrics: Option<Metrics>,
}

#[derive(Debug, Default, Deserialize)]
struct Metrics {
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    like_count: u64,
}

/// Profile plus recent tweets through the v2 API (app bearer token).
#[derive(Debug, Default)]
pub struct TwitterConnector;

impl TwitterConnector {
    /// Build the payload from a user lookup body and a timeline body.
    pub fn parse(user_body: &str, tweets_body: &str, target: &str) -> Result<Fetched, FetchError> {
        let user: UserEnvelope = serde_json::from_str(user_body)
            .map_err(|e| FetchError::Upstream(format!("malformed user lookup: {e}")))?;
        let user = user
            .data
            .ok_or_else(|| FetchError::NotFound(format!("user {target}")))?;
        let tweets: TweetsEnvelope = serde_json::from_str(tweets_body)
            .map_err(|e| FetchError::Upstream(format!("malformed timeline: {e}")))?;
        Ok(Self::shape(user, tweets))
    }

    fn shape(user: Value, tweets: TweetsEnvelope) -> Fetched {
        let username = user
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let posted: Vec<Value> = tweets
            .data
            .into_iter()
            .map(|t| {
                let m = t.public_metrics.unwrap_or_default();
                json!({
                    "id": t.id,
                    "text": t.text,
                    "retweets": m.retweet_count,
                    "likes": m.like_count,
                    "created_at": t.created_at,
                })
            })
            .collect();
        let summary = format!("Twitter @{username}: fetched {} tweets.", posted.len());
        Fetched::new(json!({ "user_info": user, "posted_tweets": posted }), summary)
    }
}

#[async_trait]
impl Connector for TwitterConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Twitter
    }

    async fn fetch(&self, target: &str, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        let creds = ctx.credentials.require(
            &SourceKind::Twitter,
            &["bearer_token"],
            "incomplete creds",
        )?;
        let bearer = &creds[0];
        let username = handle(target);
        let http = ctx.transport.client();

        let user: UserEnvelope = send_json(
            http.get(endpoint(API_BASE, &["users", "by", "username", username])?)
                .bearer_auth(bearer)
                .query(&[("user.fields", "public_metrics,description,created_at")]),
        )
        .await?;
        let user = user
            .data
            .ok_or_else(|| FetchError::NotFound(format!("user {target}")))?;
        let id = user
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Upstream("user lookup without id".into()))?
            .to_string();

        let tweets: TweetsEnvelope = send_json(
            http.get(endpoint(API_BASE, &["users", id.as_str(), "tweets"])?)
                .bearer_auth(bearer)
                .query(&[
                    ("max_results", "100"),
                    ("tweet.fields", "public_metrics,created_at"),
                ]),
        )
        .await?;

        Ok(Self::shape(user, tweets))
    }
}
