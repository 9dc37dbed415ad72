use std::result::Result;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use nostr_sdk::prelude::*;
use tokio::time::timeout;

use super::{log_dry_run, publish_thread, Platform, PlatformOptions, ThreadRefs};
use crate::controllers::filter_controller::NewsFilters;
use crate::error::HmnbError;
use crate::models::config::NostrSettings;
use crate::models::Post;
use crate::text::spans::hashtag_spans;

const PLATFORM: &str = "nostr";
const LIST_LIMIT: usize = 100;
const POW_DIFFICULTY: u8 = 20;

pub struct NostrClient {
    client: Client,
    key: Keys,
    relays: Vec<String>,
    max_post_length: usize,
    options: PlatformOptions,
}

impl NostrClient {
    pub fn new(settings: &NostrSettings, options: PlatformOptions) -> Result<Self, HmnbError> {
        let key = Keys::parse(settings.secret_key.expose())
            .map_err(|e| HmnbError::KeyParsing(e.to_string()))?;

        Ok(Self {
            client: Client::new(key.clone()),
            key,
            relays: settings.relays.clone(),
            max_post_length: settings.max_post_length,
            options,
        })
    }

    pub fn my_key(&self) -> PublicKey {
        self.key.public_key()
    }

    pub async fn connect_relays(&self) -> Result<(), HmnbError> {
        let mut connected = 0;

        for relay in &self.relays {
            match self.client.add_relay(relay.as_str()).await {
                Ok(_) => connected += 1,
                Err(e) => log::warn!("[{}] failed to add relay {}: {}", PLATFORM, relay, e),
            }
        }

        self.client.connect().await;

        if connected > 0 {
            Ok(())
        } else {
            Err(HmnbError::NostrSdk("Failed to connect to any relays".to_string()))
        }
    }
}

#[async_trait]
impl Platform for NostrClient {
    async fn list_posts(&self) -> Result<Vec<Post>, HmnbError> {
        let filter = Filter::new()
            .author(self.my_key())
            .kind(Kind::TextNote)
            .limit(LIST_LIMIT);

        let events = timeout(
            Duration::from_secs(15),
            self.client.fetch_events(filter, Duration::from_secs(10)),
        )
        .await
        .map_err(|_| HmnbError::NostrSdk("Timeout fetching own notes".to_string()))?
        .map_err(|e| HmnbError::NostrSdk(e.to_string()))?;

        let mut posts: Vec<Post> = events
            .into_iter()
            .map(|event| {
                let tags: Vec<Vec<String>> =
                    event.tags.iter().map(|tag| tag.clone().to_vec()).collect();
                let (root_id, reply_id) = thread_ids(&tags);
                Post {
                    id: event.id.to_hex(),
                    text: event.content.to_string(),
                    created_at: Utc
                        .timestamp_opt(event.created_at.as_u64() as i64, 0)
                        .single()
                        .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    root_id,
                    reply_id,
                    raw: serde_json::to_value(&event).ok(),
                }
            })
            .collect();

        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn create_post_chain(&self, chain: &[String]) -> Result<(), HmnbError> {
        if self.options.dry_run {
            log_dry_run(PLATFORM, chain);
            return Ok(());
        }

        publish_thread(PLATFORM, chain, self.options.post_delay, move |i, text, refs| async move {
            let builder = note_builder(&text, refs.as_ref())?.pow(POW_DIFFICULTY);
            let output = self
                .client
                .send_event_builder(builder)
                .await
                .map_err(|e| HmnbError::NostrSdk(format!("failed to publish note {}: {}", i, e)))?;
            Ok::<_, HmnbError>(output.val.to_hex())
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
        self.max_post_length
    }

    fn news_filters(&self) -> &NewsFilters {
        &self.options.news_filters
    }
}

/// A text note carrying its hashtags as `t` tags and, for replies, the
/// thread's `e` tags.
fn note_builder(text: &str, refs: Option<&ThreadRefs<String>>) -> Result<EventBuilder, HmnbError> {
    let mut builder = EventBuilder::text_note(text);

    for span in hashtag_spans(text) {
        builder = builder.tag(Tag::hashtag(span.value));
    }
    if let Some(refs) = refs {
        for fields in thread_tag_fields(&refs.root, &refs.parent) {
            let tag = Tag::parse(fields).map_err(|e| HmnbError::NostrSdk(e.to_string()))?;
            builder = builder.tag(tag);
        }
    }

    Ok(builder)
}

/// Marked `e` tags for a reply: the thread root, plus the direct parent when
/// it is not the root itself.
fn thread_tag_fields(root_id: &str, reply_id: &str) -> Vec<Vec<String>> {
    let marked = |id: &str, marker: &str| {
        vec!["e".to_string(), id.to_string(), String::new(), marker.to_string()]
    };

    let mut tags = vec![marked(root_id, "root")];
    if reply_id != root_id {
        tags.push(marked(reply_id, "reply"));
    }
    tags
}

/// Reads the thread root and parent back out of a note's tags.
fn thread_ids(tags: &[Vec<String>]) -> (Option<String>, Option<String>) {
    let mut root_id = None;
    let mut reply_id = None;

    for tag in tags {
        if tag.len() < 2 || tag[0] != "e" {
            continue;
        }
        let event_id = tag[1].clone();
        match tag.get(3).map(String::as_str) {
            Some("root") => root_id = Some(event_id),
            Some("reply") => reply_id = Some(event_id),
            Some(_) => {}
            // Deprecated positional e tags
            None if tag.len() == 2 => reply_id = Some(event_id),
            None => root_id = Some(event_id),
        }
    }

    (root_id, reply_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_first_reply_only_references_root() {
        let tags = thread_tag_fields("aaa", "aaa");
        assert_eq!(tags, vec![tag(&["e", "aaa", "", "root"])]);
    }

    #[test]
    fn test_later_replies_reference_root_and_parent() {
        let tags = thread_tag_fields("aaa", "bbb");
        assert_eq!(tags, vec![tag(&["e", "aaa", "", "root"]), tag(&["e", "bbb", "", "reply"])]);
    }

    fn note_tags(text: &str, created: &[String]) -> Vec<Vec<String>> {
        let refs = crate::platforms::thread_refs(created);
        let unsigned = note_builder(text, refs.as_ref())
            .unwrap()
            .build(Keys::generate().public_key());
        unsigned.tags.iter().map(|tag| tag.clone().to_vec()).collect()
    }

    #[test]
    fn test_notes_chain_to_root_and_parent() {
        let created = ["aaa".to_string(), "bbb".to_string()];

        assert!(note_tags("part [1/3]", &created[..0]).is_empty());
        assert_eq!(note_tags("part [2/3]", &created[..1]), vec![tag(&["e", "aaa", "", "root"])]);
        assert_eq!(
            note_tags("part [3/3]", &created),
            vec![tag(&["e", "aaa", "", "root"]), tag(&["e", "bbb", "", "reply"])]
        );
    }

    #[test]
    fn test_note_hashtags_become_t_tags() {
        let tags: Vec<Vec<String>> = note_tags("news [1/2]\n#NixOS #Nix", &[])
            .into_iter()
            .map(|fields| fields.iter().map(|f| f.to_lowercase()).collect())
            .collect();
        assert_eq!(tags, vec![tag(&["t", "nixos"]), tag(&["t", "nix"])]);
    }

    #[test]
    fn test_thread_ids_marked() {
        let tags = vec![
            tag(&["t", "NixOS"]),
            tag(&["e", "aaa", "", "root"]),
            tag(&["e", "bbb", "wss://relay", "reply"]),
            tag(&["p", "pubkey"]),
        ];
        assert_eq!(thread_ids(&tags), (Some("aaa".to_string()), Some("bbb".to_string())));
    }

    #[test]
    fn test_thread_ids_positional() {
        assert_eq!(thread_ids(&[tag(&["e", "ccc"])]), (None, Some("ccc".to_string())));
        assert_eq!(
            thread_ids(&[tag(&["e", "ddd", "wss://relay"])]),
            (Some("ddd".to_string()), None)
        );
        assert_eq!(thread_ids(&[]), (None, None));
    }

    #[test]
    fn test_rejects_malformed_key() {
        let settings = NostrSettings {
            secret_key: crate::models::config::Secret::new("not-a-key"),
            relays: vec!["wss://relay.damus.io".to_string()],
            max_post_length: 1000,
        };
        assert!(matches!(
            NostrClient::new(&settings, PlatformOptions::default()),
            Err(HmnbError::KeyParsing(_))
        ));
    }
}
