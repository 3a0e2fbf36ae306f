//! ============================================================================
//! Core Types for the X-Engage Client
//! ============================================================================
//! Defines the data structures shared across the linking flow, account
//! cache, and service clients. These types are serialized to JSON both for
//! the wire protocol and for IPC with the dashboard frontend.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Linking Flow Types
// ============================================================================

/// Server-side status of an account-link request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkRequestStatus {
    Pending,
    AwaitingCredentials,
    Processing,
    Completed,
    Failed,
}

/// An in-flight account-link request, owned by the flow controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRequest {
    pub request_id: String,
    pub status: LinkRequestStatus,
    pub created_at: DateTime<Utc>,
}

impl LinkRequest {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            status: LinkRequestStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Platform credentials entered by the user.
///
/// Transient: passed by value into `submit` and dropped there, never
/// persisted or cached.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_factor: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .field("second_factor", &self.second_factor.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Public profile of a successfully linked platform account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountProfile {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Outcome of a completed link exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkResult {
    pub success: bool,
    #[serde(default)]
    pub account: Option<AccountProfile>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Status poll response for an in-flight link request
#[derive(Debug, Clone, Deserialize)]
pub struct LinkStatus {
    pub status: LinkRequestStatus,
    #[serde(default)]
    pub error: Option<String>,
    /// Populated by the service once the request has completed out-of-band
    #[serde(default)]
    pub account: Option<AccountProfile>,
}

/// Presentation-facing state of the linking flow.
///
/// Transitions happen only through `LinkFlow` methods; the enum is closed so
/// the modal can never render an impossible step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum LinkState {
    Initial,
    AwaitingCredentials,
    Processing,
    Success { result: LinkResult },
    Error { message: String },
}

impl LinkState {
    /// Short name for logs and `InvalidState` errors
    pub fn name(&self) -> &'static str {
        match self {
            LinkState::Initial => "initial",
            LinkState::AwaitingCredentials => "awaiting_credentials",
            LinkState::Processing => "processing",
            LinkState::Success { .. } => "success",
            LinkState::Error { .. } => "error",
        }
    }

    /// Terminal states require user action before anything else happens
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkState::Success { .. } | LinkState::Error { .. })
    }
}

// ============================================================================
// Linked Account Types
// ============================================================================

/// A platform account linked to the current user, as cached client-side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedAccount {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl LinkedAccount {
    /// Build a cache entry from a link result profile (used when the fresh
    /// account fetch after a successful link fails or comes back empty)
    pub fn from_profile(profile: AccountProfile) -> Self {
        Self {
            username: profile.username,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
            is_default: false,
            is_active: true,
        }
    }
}

// ============================================================================
// User / Session Types
// ============================================================================

/// Profile of the dashboard user (not the linked platform account)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Login response from the engagement service
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

/// Server-side user settings; tone presets live here, split into the
/// built-in set and the user-created set
#[derive(Debug, Clone, Deserialize)]
pub struct UserSettings {
    pub default_tone: String,
    #[serde(default)]
    pub tone_presets: Vec<TonePreset>,
    #[serde(default)]
    pub custom_tone_presets: Vec<TonePreset>,
}

// ============================================================================
// Content Generation Types
// ============================================================================

/// A named tone preset offered in the settings screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TonePreset {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Tone applied to a single generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneSettings {
    pub tone_name: String,
    pub tone_strength: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

impl ToneSettings {
    pub fn named(tone_name: impl Into<String>) -> Self {
        Self {
            tone_name: tone_name.into(),
            tone_strength: 0.7,
            custom_instructions: None,
        }
    }
}

/// One generated candidate for a post or reply
#[derive(Debug, Clone, Deserialize)]
pub struct ContentVariant {
    pub text: String,
    pub score: f32,
}

/// Response carrying generated variants
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedContent {
    pub variants: Vec<ContentVariant>,
    pub source_text: String,
}

/// One post within a generated thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadPost {
    pub position: u32,
    pub text: String,
}

/// Response carrying a generated thread
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedThread {
    #[serde(rename = "tweets")]
    pub posts: Vec<ThreadPost>,
    pub main_topic: String,
}

/// Tone analysis of an arbitrary piece of text
#[derive(Debug, Clone, Deserialize)]
pub struct ToneAnalysis {
    pub analysis: String,
    pub tone_breakdown: HashMap<String, f32>,
}

// ============================================================================
// Posting / Analytics Types
// ============================================================================

/// Result of publishing a single post or reply
#[derive(Debug, Clone, Deserialize)]
pub struct PublishResult {
    pub success: bool,
    #[serde(default, alias = "tweet_id")]
    pub post_id: Option<String>,
    #[serde(default, alias = "tweet_url")]
    pub post_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of publishing a thread
#[derive(Debug, Clone, Deserialize)]
pub struct PublishThreadResult {
    pub success: bool,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default, alias = "tweet_ids")]
    pub post_ids: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A post scraped from the platform timeline
#[derive(Debug, Clone, Deserialize)]
pub struct TimelinePost {
    pub id: String,
    pub text: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default, alias = "retweets_count")]
    pub reposts_count: u64,
    #[serde(default)]
    pub replies_count: u64,
}

/// Engagement analytics for a single post
#[derive(Debug, Clone, Deserialize)]
pub struct EngagementAnalytics {
    pub engagement_rate: f64,
    pub sentiment_score: f64,
    #[serde(default)]
    pub tone_analysis: HashMap<String, f64>,
    #[serde(default)]
    pub impressions: Option<u64>,
}

// ============================================================================
// Error Taxonomy
// ============================================================================

/// Errors surfaced by the client core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngageError {
    /// Transport failure or an undecodable response body
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The service answered with a non-2xx status; `detail` is the
    /// human-readable message it supplied (may be empty)
    #[error("rejected by service (status {status}): {detail}")]
    RejectedByService { status: u16, detail: String },

    /// Operation invoked outside its legal state; indicates a caller bug
    #[error("`{operation}` is not valid in the {state} state")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl EngageError {
    /// Message shown to the user: the verbatim service `detail` when one was
    /// given, otherwise the per-operation fallback
    pub fn display_message(&self, fallback: &str) -> String {
        match self {
            EngageError::RejectedByService { detail, .. } if !detail.is_empty() => detail.clone(),
            _ => fallback.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials {
            identifier: "alice".to_string(),
            secret: "hunter2".to_string(),
            second_factor: Some("123456".to_string()),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("123456"));
    }

    #[test]
    fn test_display_message_prefers_detail() {
        let err = EngageError::RejectedByService {
            status: 401,
            detail: "bad credentials".to_string(),
        };
        assert_eq!(err.display_message("generic"), "bad credentials");

        let err = EngageError::RejectedByService {
            status: 500,
            detail: String::new(),
        };
        assert_eq!(err.display_message("generic"), "generic");

        let err = EngageError::ServiceUnavailable("timed out".to_string());
        assert_eq!(err.display_message("generic"), "generic");
    }

    #[test]
    fn test_link_state_serializes_with_phase_tag() {
        let state = LinkState::Error {
            message: "nope".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["phase"], "error");
        assert_eq!(json["message"], "nope");
    }

    #[test]
    fn test_link_state_terminality() {
        assert!(!LinkState::Initial.is_terminal());
        assert!(!LinkState::AwaitingCredentials.is_terminal());
        assert!(!LinkState::Processing.is_terminal());
        assert!(LinkState::Error {
            message: String::new()
        }
        .is_terminal());
    }

    #[test]
    fn test_link_request_status_wire_format() {
        let status: LinkRequestStatus = serde_json::from_str("\"awaiting_credentials\"").unwrap();
        assert_eq!(status, LinkRequestStatus::AwaitingCredentials);
        assert_eq!(
            serde_json::to_string(&LinkRequestStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
