use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{log_dry_run, publish_thread, Platform, PlatformOptions, ThreadRefs};
use crate::controllers::filter_controller::NewsFilters;
use crate::error::HmnbError;
use crate::models::config::{MastodonSettings, Secret};
use crate::models::Post;

const PLATFORM: &str = "mastodon";
const STATUS_PAGE_LIMIT: &str = "40";

#[derive(Debug, Deserialize)]
struct Account {
    id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Status {
    pub id: String,
    /// Rendered HTML body.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
}

/// Maps a status from the API, keeping the full object for the snapshot.
fn post_from_status(value: serde_json::Value) -> Result<Post, HmnbError> {
    let status = Status::deserialize(&value)
        .map_err(|e| HmnbError::api(PLATFORM, format!("unexpected status object: {}", e)))?;

    Ok(Post {
        id: status.id,
        text: status.content,
        created_at: status.created_at,
        root_id: None,
        reply_id: status.in_reply_to_id,
        raw: Some(value),
    })
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct NewStatus<'a> {
    pub status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<&'a str>,
}

/// Every status after the first replies to the one posted just before it.
fn new_status<'a>(text: &'a str, refs: Option<&'a ThreadRefs<String>>) -> NewStatus<'a> {
    NewStatus {
        status: text,
        in_reply_to_id: refs.map(|refs| refs.parent.as_str()),
    }
}

pub struct MastodonClient {
    http: reqwest::Client,
    server: String,
    access_token: Secret,
    max_post_length: usize,
    options: PlatformOptions,
}

impl MastodonClient {
    pub fn new(settings: &MastodonSettings, options: PlatformOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            server: settings.server.trim_end_matches('/').to_string(),
            access_token: settings.access_token.clone(),
            max_post_length: settings.max_post_length,
            options,
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.server, path)
    }

    async fn current_account(&self) -> Result<Account, HmnbError> {
        let response = self
            .http
            .get(self.api("accounts/verify_credentials"))
            .bearer_auth(self.access_token.expose())
            .send()
            .await?;
        Ok(check(response)
            .await
            .map_err(|e| HmnbError::api(PLATFORM, format!("getting current user: {}", e)))?
            .json()
            .await?)
    }

    async fn statuses_page(
        &self,
        account_id: &str,
        max_id: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, HmnbError> {
        let mut query = vec![("limit", STATUS_PAGE_LIMIT)];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id));
        }

        let response = self
            .http
            .get(self.api(&format!("accounts/{}/statuses", account_id)))
            .bearer_auth(self.access_token.expose())
            .query(&query)
            .send()
            .await?;
        Ok(check(response)
            .await
            .map_err(|e| HmnbError::api(PLATFORM, format!("getting account statuses: {}", e)))?
            .json()
            .await?)
    }

    async fn post_status(&self, status: &NewStatus<'_>) -> Result<Status, HmnbError> {
        let response = self
            .http
            .post(self.api("statuses"))
            .bearer_auth(self.access_token.expose())
            .json(status)
            .send()
            .await?;
        Ok(check(response)
            .await
            .map_err(|e| HmnbError::api(PLATFORM, format!("posting status: {}", e)))?
            .json()
            .await?)
    }
}

#[async_trait]
impl Platform for MastodonClient {
    async fn list_posts(&self) -> Result<Vec<Post>, HmnbError> {
        let account = self.current_account().await?;

        let mut posts: Vec<Post> = Vec::new();
        let mut max_id: Option<String> = None;
        loop {
            let page = self.statuses_page(&account.id, max_id.as_deref()).await?;
            let page = page
                .into_iter()
                .map(post_from_status)
                .collect::<Result<Vec<_>, _>>()?;
            let Some(last) = page.last() else {
                break;
            };
            max_id = Some(last.id.clone());
            log::debug!("[{}] fetched {} statuses up to {:?}", PLATFORM, page.len(), max_id);
            posts.extend(page);
        }

        Ok(posts)
    }

    async fn create_post_chain(&self, chain: &[String]) -> Result<(), HmnbError> {
        if self.options.dry_run {
            log_dry_run(PLATFORM, chain);
            return Ok(());
        }

        publish_thread(PLATFORM, chain, self.options.post_delay, move |_, text, refs| async move {
            let status = self.post_status(&new_status(&text, refs.as_ref())).await;
            status.map(|status| status.id)
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

async fn check(response: reqwest::Response) -> Result<reqwest::Response, HmnbError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HmnbError::api(PLATFORM, format!("{}: {}", status, body)))
}
