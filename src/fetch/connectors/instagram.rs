use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fetch::connectors::graph::{self, GRAPH_BASE};
use crate::fetch::connectors::{endpoint, handle};
use crate::fetch::types::{Connector, FetchContext, FetchError, Fetched, SourceKind};

const POST_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct Discovery {
    business_discovery: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    biography: Option<String>,
    #[serde(default)]
    followers_count: u64,
    #[serde(default)]
    follows_count: u64,
    #[serde(default)]
    media_count: u64,
    #[serde(default)]
    media: Option<MediaPage>,
}

#[derive(Debug, Deserialize)]
struct MediaPage {
    #[serde(default)]
    data: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    id: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    like_count: Option<u64>,
    #[serde(default)]
    comments_count: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
}

/// Public business/creator profile via Graph "business discovery".
/// Needs an `access_token` and the caller's own `ig_user_id`.
#[derive(Debug, Default)]
pub struct InstagramConnector;

impl InstagramConnector {
    pub fn parse(body: &str, username: &str) -> Result<Fetched, FetchError> {
        let d: Discovery = serde_json::from_str(body)
            .map_err(|e| FetchError::Upstream(format!("malformed discovery response: {e}")))?;
        let profile = d
            .business_discovery
            .ok_or_else(|| FetchError::NotFound(format!("profile {username}")))?;
        Ok(Self::shape(profile))
    }

    fn shape(p: Profile) -> Fetched {
        let posts: Vec<Value> = p
            .media
            .map(|m| m.data)
            .unwrap_or_default()
            .into_iter()
            .take(POST_LIMIT)
            .map(|m| {
                json!({
                    "shortcode": shortcode(m.permalink.as_deref()).unwrap_or(m.id),
                    "caption": m.caption,
                    "likers": m.like_count,
                    "comments": m.comments_count,
                    "datetime_utc": m.timestamp,
                    "permalink": m.permalink,
                })
            })
            .collect();
        let summary = format!(
            "Instagram {}: {} posts, Followers: {}",
            p.username, p.media_count, p.followers_count
        );
        let raw = json!({
            "username": p.username,
            "fullname": p.name,
            "bio": p.biography,
            "followers": p.followers_count,
            "following": p.follows_count,
            "posts_count": p.media_count,
            // Discovery only resolves public business/creator accounts.
            "is_private": false,
            "latest_posts": posts,
        });
        Fetched::new(raw, summary)
    }
}

/// `https://www.instagram.com/p/<code>/` -> `<code>`
/// Instagram handles are ASCII letters, digits, `.` and `_`. Anything else would
/// leak into the `business_discovery` field expression.
pub fn is_valid_username(u: &str) -> bool {
    !u.is_empty()
        && u.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

fn shortcode(permalink: Option<&str>) -> Option<String> {
    let link = permalink?;
    let mut parts = link.trim_end_matches('/').rsplit('/');
    let code = parts.next()?;
    matches!(parts.next(), Some("p") | Some("reel") | Some("tv")).then(|| code.to_string())
}

#[async_trait]
impl Connector for InstagramConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Instagram
    }

    async fn fetch(&self, target: &str, ctx: &FetchContext<'_>) -> Result<Fetched, FetchError> {
        let creds = ctx.credentials.require(
            &SourceKind::Instagram,
            &["access_token", "ig_user_id"],
            "incomplete creds",
        )?;
        let (token, ig_user_id) = (&creds[0], &creds[1]);
        let username = handle(target);
        if !is_valid_username(username) {
            return Err(FetchError::NotFound(format!("invalid username {username:?}")));
        }
        let fields = format!(
            "business_discovery.username({username}){{username,name,biography,followers_count,\
             follows_count,media_count,media.limit({POST_LIMIT}){{id,caption,like_count,\
             comments_count,timestamp,permalink}}}}"
        );

        let d: Discovery = graph::get(
            ctx.transport
                .client()
                .get(endpoint(GRAPH_BASE, &[ig_user_id.as_str()])?)
                .query(&[("fields", fields.as_str()), ("access_token", token.as_str())]),
        )
        .await?;
        let profile = d
            .business_discovery
            .ok_or_else(|| FetchError::NotFound(format!("profile {username}")))?;
        Ok(Self::shape(profile))
    }
}
