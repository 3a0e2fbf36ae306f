//! ============================================================================
//! AnalyticsClient - Engagement Metrics and Timelines
//! ============================================================================

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::api::ApiClient;
use crate::types::{EngagementAnalytics, TimelinePost};

/// Client for engagement analytics and timeline reads
pub struct AnalyticsClient {
    api: Arc<ApiClient>,
}

impl AnalyticsClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Fetch engagement metrics for a published post
    pub async fn post_analytics(&self, post_id: &str) -> Result<EngagementAnalytics> {
        debug!(post_id, "fetching post analytics");
        let analytics = self
            .api
            .get(&format!("/platform/analytics/{}", post_id))
            .await?;
        Ok(analytics)
    }

    /// Fetch a user's recent timeline
    pub async fn timeline(&self, username: &str, count: u32) -> Result<Vec<TimelinePost>> {
        debug!(username, count, "fetching timeline");
        let posts = self
            .api
            .get(&format!(
                "/platform/timeline?username={}&count={}",
                username, count
            ))
            .await?;
        Ok(posts)
    }
}
