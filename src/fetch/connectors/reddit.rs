use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fetch::connectors::{endpoint, handle, send_json};
use crate::fetch::types::{Connector, FetchContext, FetchError, Fetched, SourceKind};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const SUBMISSION_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
struct Token {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}
#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}
#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}
#[derive(Debug, Deserialize)]
struct Submission {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
}

/// Recent submissions of a Reddit user via app-only OAuth.
#[derive(Debug, Default)]
pub struct RedditConnector;

impl RedditConnector {
    /// Turn a `/user/<name>/submitted` listing into the `submissions` payload.
    pub fn parse_listing(body: &str, user: &str) -> Result<Fetched, FetchError> {
        let listing: Listing = serde_json::from_str(body)
            .map_err(|e| FetchError::Upstream(format!("malformed listing: {e}")))?;
        Ok(Self::shape(listing, user))
    }

    fn shape(listing: Listing, user: &str) -> Fetched {
        let submissions: Vec<Value> = listing
            .data
            .children
            .into_iter()
            .take(SUBMISSION_LIMIT)
            .map(|c| {
                let s = c.data;
                json!({
                    "id": s.id,
                    "title": s.title,
                    "subreddit": s.subreddit,
                    "score": s.score,
                    "created_utc": unix_to_iso(s.created_utc),
                })
            })
            .collect();
        let summary = format!("Reddit u/{user}: {} recent submissions", submissions.len());
        Fetched::new(json!({ "submissions": submissions }), summary)
    }
}

fn unix_to_iso(secs: f64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs as i64, 0).map(|d| d.to_rfc3339())
}

#[async_trait]
impl Connector for RedditConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }

    async fn fetch(&self, target: &str, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        let creds = ctx.credentials.require(
            &SourceKind::Reddit,
            &["client_id", "client_secret", "user_agent"],
            "incomplete creds",
        )?;
        let (client_id, client_secret, user_agent) = (&creds[0], &creds[1], &creds[2]);
        let user = handle(target).trim_start_matches("u/");
        let http = ctx.transport.client();

        let token: Token = send_json(
            http.post(TOKEN_URL)
                .basic_auth(client_id, Some(client_secret))
                .header(reqwest::header::USER_AGENT, user_agent.as_str())
                .form(&[("grant_type", "client_credentials")]),
        )
        .await?;

        let listing: Listing = send_json(
            http.get(endpoint(API_BASE, &["user", user, "submitted"])?)
                .bearer_auth(&token.access_token)
                .header(reqwest::header::USER_AGENT, user_agent.as_str())
                .query(&[("sort", "new"), ("raw_json", "1")])
                .query(&[("limit", SUBMISSION_LIMIT)]),
        )
        .await?;

        Ok(Self::shape(listing, user))
    }
}
