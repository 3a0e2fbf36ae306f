//! ============================================================================
//! Service Clients - Request/Response Wrappers
//! ============================================================================
//! Thin clients over the engagement service's non-linking surfaces:
//! - ContentClient: AI generation of replies, posts, threads, tone analysis
//! - PostingClient: publishing posts, replies, and threads
//! - AnalyticsClient: engagement analytics and timeline fetches
//! ============================================================================

mod analytics;
mod content;
mod posting;

pub use analytics::AnalyticsClient;
pub use content::{ContentClient, MAX_POST_LENGTH};
pub use posting::PostingClient;
