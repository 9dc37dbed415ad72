pub mod bluesky;
pub mod mastodon;
pub mod nostr;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::controllers::filter_controller::NewsFilters;
use crate::error::HmnbError;
use crate::models::Post;

pub use bluesky::BlueskyClient;
pub use mastodon::MastodonClient;
pub use nostr::NostrClient;

/// A social-network account the bot can publish to.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Recent posts of the account, newest first as the platform returns them.
    async fn list_posts(&self) -> Result<Vec<Post>, HmnbError>;

    /// Publishes `chain` as a thread: the first post is the root and every
    /// later post replies to its predecessor. Stops at the first failure.
    async fn create_post_chain(&self, chain: &[String]) -> Result<(), HmnbError>;

    fn name(&self) -> &str;

    fn max_posts_per_run(&self) -> usize;

    fn max_post_length(&self) -> usize;

    fn news_filters(&self) -> &NewsFilters;
}

/// Settings every platform client carries alongside its credentials.
#[derive(Debug, Clone)]
pub struct PlatformOptions {
    pub dry_run: bool,
    pub max_posts: usize,
    pub post_delay: Duration,
    pub news_filters: NewsFilters,
}

impl Default for PlatformOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            max_posts: 1,
            post_delay: Duration::from_secs(2),
            news_filters: NewsFilters::new(),
        }
    }
}

pub(crate) fn log_dry_run(platform: &str, chain: &[String]) {
    for (i, post) in chain.iter().enumerate() {
        log::info!(
            "[{}] dry run, not posting part {}/{}: {:?}",
            platform,
            i + 1,
            chain.len(),
            post
        );
    }
}

/// Where a post sits in a thread: the first post of the chain and the post
/// directly before it. Both are the same for the second post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRefs<R> {
    pub root: R,
    pub parent: R,
}

/// References for the next post, given the posts already created in order.
pub fn thread_refs<R: Clone>(created: &[R]) -> Option<ThreadRefs<R>> {
    Some(ThreadRefs {
        root: created.first()?.clone(),
        parent: created.last()?.clone(),
    })
}

/// Sends `chain` one post at a time through `publish`, handing each post the
/// references of the thread so far, and sleeps `delay` after every post.
/// Returns the references of the created posts. Stops at the first error.
pub(crate) async fn publish_thread<R, F, Fut>(
    platform: &str,
    chain: &[String],
    delay: Duration,
    mut publish: F,
) -> Result<Vec<R>, HmnbError>
where
    R: Clone,
    F: FnMut(usize, String, Option<ThreadRefs<R>>) -> Fut,
    Fut: Future<Output = Result<R, HmnbError>>,
{
    let mut created: Vec<R> = Vec::with_capacity(chain.len());

    for (i, text) in chain.iter().enumerate() {
        log::info!("[{}] posting part {}/{}: {:?}", platform, i + 1, chain.len(), text);
        let refs = thread_refs(&created);
        created.push(publish(i, text.clone(), refs).await?);
        tokio::time::sleep(delay).await;
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("part {}", i)).collect()
    }

    #[test]
    fn test_thread_refs() {
        assert_eq!(thread_refs::<u32>(&[]), None);
        assert_eq!(thread_refs(&[1]), Some(ThreadRefs { root: 1, parent: 1 }));
        assert_eq!(thread_refs(&[1, 2]), Some(ThreadRefs { root: 1, parent: 2 }));
        assert_eq!(thread_refs(&[1, 2, 3]), Some(ThreadRefs { root: 1, parent: 3 }));
    }

    #[tokio::test]
    async fn test_every_part_replies_to_its_predecessor() {
        let mut seen = Vec::new();
        let created = publish_thread("test", &chain(3), Duration::ZERO, |i, text, refs| {
            seen.push((text, refs));
            let id = i as u32 + 1;
            async move { Ok::<_, HmnbError>(id) }
        })
        .await
        .unwrap();

        assert_eq!(created, vec![1, 2, 3]);
        assert_eq!(
            seen,
            vec![
                ("part 1".to_string(), None),
                ("part 2".to_string(), Some(ThreadRefs { root: 1, parent: 1 })),
                ("part 3".to_string(), Some(ThreadRefs { root: 1, parent: 2 })),
            ]
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let mut attempts = 0;
        let result = publish_thread("test", &chain(3), Duration::ZERO, |i, _, _| {
            attempts += 1;
            async move {
                if i == 1 {
                    Err(HmnbError::api("test", "rejected"))
                } else {
                    Ok(i)
                }
            }
        })
        .await;

        assert!(matches!(result, Err(HmnbError::Api { .. })));
        assert_eq!(attempts, 2);
    }
}
