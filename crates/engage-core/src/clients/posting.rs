//! ============================================================================
//! PostingClient - Publishing Posts, Replies, and Threads
//! ============================================================================
//! Publishes content through the service, which signs requests with the
//! session's default linked account. Length limits are checked here so a
//! too-long draft fails before the network does.
//! ============================================================================

use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::ApiClient;
use crate::clients::content::MAX_POST_LENGTH;
use crate::types::{PublishResult, PublishThreadResult};

/// Client for publishing through a linked account
pub struct PostingClient {
    api: Arc<ApiClient>,
}

impl PostingClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Publish a standalone post
    pub async fn publish_post(&self, text: &str) -> Result<PublishResult> {
        validate_post(text)?;
        info!(length = text.chars().count(), "publishing post");

        let request = PublishRequest { content: text };
        let result: PublishResult = self.api.post("/platform/post", &request).await?;
        info!(post_id = ?result.post_id, "post published");
        Ok(result)
    }

    /// Publish a reply to an existing post
    pub async fn publish_reply(&self, post_id: &str, text: &str) -> Result<PublishResult> {
        validate_post(text)?;
        info!(post_id, "publishing reply");

        let request = PublishRequest { content: text };
        let result = self
            .api
            .post(&format!("/platform/reply/{}", post_id), &request)
            .await?;
        Ok(result)
    }

    /// Publish a thread. Every post is validated up front; the service chains
    /// the replies itself.
    pub async fn publish_thread(&self, posts: &[String]) -> Result<PublishThreadResult> {
        if posts.is_empty() {
            bail!("Thread must contain at least one post");
        }
        for (index, text) in posts.iter().enumerate() {
            validate_post(text).map_err(|e| anyhow::anyhow!("Post {}: {}", index + 1, e))?;
        }
        info!(count = posts.len(), "publishing thread");

        let request = PublishThreadRequest { posts };
        let result: PublishThreadResult = self.api.post("/platform/post-thread", &request).await?;
        info!(
            count = result.post_ids.as_ref().map_or(0, Vec::len),
            "thread published"
        );
        Ok(result)
    }
}

fn validate_post(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("Post text is empty");
    }
    let length = text.chars().count() as u32;
    if length > MAX_POST_LENGTH {
        bail!(
            "Post is {} characters, limit is {}",
            length,
            MAX_POST_LENGTH
        );
    }
    Ok(())
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Serialize)]
struct PublishRequest<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct PublishThreadRequest<'a> {
    #[serde(rename = "tweets")]
    posts: &'a [String],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngageConfig;

    fn client() -> PostingClient {
        let api = Arc::new(ApiClient::new(
            &EngageConfig::with_base_url("http://localhost:0/api"),
            None,
        ));
        PostingClient::new(api)
    }

    #[tokio::test]
    async fn empty_post_is_rejected_before_any_request() {
        let posting = client();
        let err = posting.publish_post("   ").await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn over_limit_post_is_rejected_before_any_request() {
        let posting = client();
        let text = "x".repeat(281);
        let err = posting.publish_post(&text).await.unwrap_err();
        assert!(err.to_string().contains("281"));
    }

    #[tokio::test]
    async fn thread_reports_which_post_is_over_limit() {
        let posting = client();
        let posts = vec!["fine".to_string(), "y".repeat(300)];
        let err = posting.publish_thread(&posts).await.unwrap_err();
        assert!(err.to_string().starts_with("Post 2:"));
    }

    #[tokio::test]
    async fn empty_thread_is_rejected() {
        let posting = client();
        let err = posting.publish_thread(&[]).await.unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }
}
