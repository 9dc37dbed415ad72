use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{log_dry_run, publish_thread, Platform, PlatformOptions, ThreadRefs};
use crate::controllers::filter_controller::NewsFilters;
use crate::error::HmnbError;
use crate::models::config::BlueskySettings;
use crate::models::Post;
use crate::text::spans::{hashtag_spans, link_spans};

pub const API_ENTRYWAY: &str = "https://bsky.social";
pub const MAX_POST_LENGTH: usize = 300;
const PLATFORM: &str = "bluesky";
const POST_COLLECTION: &str = "app.bsky.feed.post";
const FEED_LIMIT: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub access_jwt: String,
}

#[derive(Debug, Serialize)]
struct CreateSessionInput<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: StrongRef,
    pub parent: StrongRef,
}

impl From<ThreadRefs<StrongRef>> for ReplyRef {
    fn from(refs: ThreadRefs<StrongRef>) -> Self {
        ReplyRef {
            root: refs.root,
            parent: refs.parent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

/// An `app.bsky.feed.post` record as sent to `createRecord`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    #[serde(rename = "$type")]
    pub record_type: &'static str,
    pub text: String,
    pub created_at: String,
    pub langs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Facet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
}

#[derive(Debug, Serialize)]
struct CreateRecordInput<'a> {
    repo: &'a str,
    collection: &'a str,
    record: &'a FeedPost,
}

#[derive(Debug, Deserialize)]
struct AuthorFeed {
    feed: Vec<FeedViewPost>,
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PostView {
    uri: String,
    record: serde_json::Value,
}

/// The part of a listed post record the bot reads back.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedRecord {
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    reply: Option<ReplyRef>,
}

pub struct BlueskyClient {
    http: reqwest::Client,
    host: String,
    session: Session,
    options: PlatformOptions,
}

impl BlueskyClient {
    pub async fn login(
        settings: &BlueskySettings,
        options: PlatformOptions,
    ) -> Result<Self, HmnbError> {
        Self::login_at(API_ENTRYWAY, settings, options).await
    }

    pub async fn login_at(
        host: &str,
        settings: &BlueskySettings,
        options: PlatformOptions,
    ) -> Result<Self, HmnbError> {
        let http = reqwest::Client::new();
        let identifier = settings.handle.trim_start_matches('@');

        let response = http
            .post(format!("{}/xrpc/com.atproto.server.createSession", host))
            .json(&CreateSessionInput {
                identifier,
                password: settings.app_password.expose(),
            })
            .send()
            .await?;
        let session: Session = check(response)
            .await
            .map_err(|e| {
                let message = format!("creating authenticated session for {:?}: {}", identifier, e);
                HmnbError::api(PLATFORM, message)
            })?
            .json()
            .await?;

        log::info!("[{}] logged in as {} ({})", PLATFORM, identifier, session.did);
        Ok(Self::with_session(host, session, options))
    }

    pub fn with_session(
        host: impl Into<String>,
        session: Session,
        options: PlatformOptions,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.into(),
            session,
            options,
        }
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.host, method)
    }

    async fn create_record(&self, record: &FeedPost) -> Result<StrongRef, HmnbError> {
        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&self.session.access_jwt)
            .json(&CreateRecordInput {
                repo: &self.session.did,
                collection: POST_COLLECTION,
                record,
            })
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

#[async_trait]
impl Platform for BlueskyClient {
    async fn list_posts(&self) -> Result<Vec<Post>, HmnbError> {
        let limit = FEED_LIMIT.to_string();
        let response = self
            .http
            .get(self.xrpc("app.bsky.feed.getAuthorFeed"))
            .bearer_auth(&self.session.access_jwt)
            .query(&[("actor", self.session.did.as_str()), ("limit", limit.as_str())])
            .send()
            .await?;
        let feed: AuthorFeed = check(response)
            .await
            .map_err(|e| HmnbError::api(PLATFORM, format!("getting author feed: {}", e)))?
            .json()
            .await?;

        feed.feed.into_iter().map(|item| post_from_view(item.post)).collect()
    }

    async fn create_post_chain(&self, chain: &[String]) -> Result<(), HmnbError> {
        if self.options.dry_run {
            log_dry_run(PLATFORM, chain);
            return Ok(());
        }

        let delay = self.options.post_delay;
        publish_thread(PLATFORM, chain, delay, move |i, text, refs| async move {
            let record = build_post(&text, refs.map(ReplyRef::from), Utc::now());
            self.create_record(&record).await.map_err(|e| {
                HmnbError::api(PLATFORM, format!("failed to create post {}: {}", i, e))
            })
        })
        .await?;

        Ok(())
    }

    fn name(&self) -> &str {
        PLATFORM
    }

    fn max_posts_per_run(&self) -> usize {
        self.options.max_posts
    }

    fn max_post_length(&self) -> usize {
        MAX_POST_LENGTH
    }

    fn news_filters(&self) -> &NewsFilters {
        &self.options.news_filters
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, HmnbError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HmnbError::api(PLATFORM, format!("{}: {}", status, body)))
}

/// Maps a feed post view, keeping the full view for the snapshot.
fn post_from_view(value: serde_json::Value) -> Result<Post, HmnbError> {
    let view = PostView::deserialize(&value)
        .map_err(|e| HmnbError::api(PLATFORM, format!("unexpected feed item: {}", e)))?;
    let record = FeedRecord::deserialize(&view.record).map_err(|e| {
        HmnbError::api(PLATFORM, format!("unexpected record type in feed post {}: {}", view.uri, e))
    })?;

    Ok(Post {
        id: view.uri,
        text: record.text,
        created_at: record.created_at,
        root_id: record.reply.as_ref().map(|reply| reply.root.uri.clone()),
        reply_id: record.reply.map(|reply| reply.parent.uri),
        raw: Some(value),
    })
}

pub fn build_post(text: &str, reply: Option<ReplyRef>, now: DateTime<Utc>) -> FeedPost {
    FeedPost {
        record_type: POST_COLLECTION,
        text: text.to_string(),
        created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        langs: vec!["en".to_string()],
        facets: facets(text),
        reply,
    }
}

/// Rich-text annotations so hashtags and links render as such.
pub fn facets(text: &str) -> Vec<Facet> {
    let tags = hashtag_spans(text).into_iter().map(|span| Facet {
        index: ByteSlice {
            byte_start: span.start,
            byte_end: span.end,
        },
        features: vec![FacetFeature::Tag { tag: span.value }],
    });
    let links = link_spans(text).into_iter().map(|span| Facet {
        index: ByteSlice {
            byte_start: span.start,
            byte_end: span.end,
        },
        features: vec![FacetFeature::Link { uri: span.value }],
    });
    tags.chain(links).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::thread_refs;
    use chrono::TimeZone;
    use serde_json::json;

    fn strong(n: u32) -> StrongRef {
        StrongRef {
            uri: format!("at://did:plc:bot/app.bsky.feed.post/{}", n),
            cid: format!("cid{}", n),
        }
    }

    #[test]
    fn test_build_root_post() {
        let now = Utc.with_ymd_and_hms(2025, 7, 2, 6, 47, 4).unwrap();
        let record = build_post("News https://nix.dev [1/2]\n#NixOS #Nix", None, now);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "$type": "app.bsky.feed.post",
                "text": "News https://nix.dev [1/2]\n#NixOS #Nix",
                "createdAt": "2025-07-02T06:47:04Z",
                "langs": ["en"],
                "facets": [
                    {"index": {"byteStart": 27, "byteEnd": 33}, "features": [{"$type": "app.bsky.richtext.facet#tag", "tag": "NixOS"}]},
                    {"index": {"byteStart": 34, "byteEnd": 38}, "features": [{"$type": "app.bsky.richtext.facet#tag", "tag": "Nix"}]},
                    {"index": {"byteStart": 5, "byteEnd": 20}, "features": [{"$type": "app.bsky.richtext.facet#link", "uri": "https://nix.dev"}]}
                ]
            })
        );
    }

    #[test]
    fn test_build_reply_post() {
        let now = Utc.with_ymd_and_hms(2025, 7, 2, 6, 47, 4).unwrap();
        let reply = ReplyRef {
            root: strong(1),
            parent: strong(2),
        };
        let record = build_post("third part [3/3]", Some(reply), now);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["reply"]["root"]["uri"], "at://did:plc:bot/app.bsky.feed.post/1");
        assert_eq!(value["reply"]["parent"]["cid"], "cid2");
        assert!(value.get("facets").is_none());
    }

    #[test]
    fn test_thread_reply_refs() {
        let now = Utc.with_ymd_and_hms(2025, 7, 2, 6, 47, 4).unwrap();
        let created = [strong(1), strong(2), strong(3)];

        let replies: Vec<Option<ReplyRef>> = (0..created.len())
            .map(|i| {
                let reply = thread_refs(&created[..i]).map(ReplyRef::from);
                build_post("part", reply, now).reply
            })
            .collect();

        assert_eq!(replies[0], None);
        assert_eq!(
            replies[1],
            Some(ReplyRef {
                root: strong(1),
                parent: strong(1),
            })
        );
        assert_eq!(
            replies[2],
            Some(ReplyRef {
                root: strong(1),
                parent: strong(2),
            })
        );
    }

    #[test]
    fn test_post_from_feed_view() {
        let view = json!({
            "uri": "at://did:plc:bot/app.bsky.feed.post/3",
            "cid": "cid3",
            "record": {
                "$type": "app.bsky.feed.post",
                "text": "second part [2/2]",
                "createdAt": "2025-07-02T06:47:06Z",
                "reply": {
                    "root": {"uri": "at://did:plc:bot/app.bsky.feed.post/1", "cid": "cid1"},
                    "parent": {"uri": "at://did:plc:bot/app.bsky.feed.post/2", "cid": "cid2"}
                },
                "facets": [{"index": {"byteStart": 0, "byteEnd": 1}, "features": [{"$type": "app.bsky.richtext.facet#mention", "did": "did:plc:x"}]}]
            }
        });

        let post = post_from_view(view.clone()).unwrap();
        assert_eq!(post.text, "second part [2/2]");
        assert_eq!(post.root_id.as_deref(), Some("at://did:plc:bot/app.bsky.feed.post/1"));
        assert_eq!(post.reply_id.as_deref(), Some("at://did:plc:bot/app.bsky.feed.post/2"));
        assert_eq!(post.raw, Some(view));
    }

    #[test]
    fn test_non_post_record_is_an_error() {
        let view = json!({
            "uri": "at://did:plc:bot/app.bsky.feed.repost/1",
            "record": {"$type": "app.bsky.feed.repost", "subject": {}}
        });
        assert!(matches!(post_from_view(view), Err(HmnbError::Api { .. })));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_touch_network() {
        let session = Session {
            did: "did:plc:bot".to_string(),
            access_jwt: "jwt".to_string(),
        };
        // Unroutable host: any request would fail.
        let client =
            BlueskyClient::with_session("http://127.0.0.1:9", session, PlatformOptions::default());
        client
            .create_post_chain(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(client.max_post_length(), 300);
        assert_eq!(client.name(), "bluesky");
    }
}
