//! ============================================================================
//! ENGAGE-CORE: X-Engage's Brain
//! ============================================================================
//! This crate handles all client-side logic for the X-Engage dashboard:
//! - Credential-based account linking flow with live state updates
//! - Linked account list with a best-effort local cache
//! - Persisted dashboard session via redb
//! - Thin clients for content generation, publishing, and analytics
//! ============================================================================

pub mod accounts;
pub mod api;
pub mod clients;
pub mod config;
pub mod linking;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use accounts::AccountManager;
pub use api::ApiClient;
pub use clients::{AnalyticsClient, ContentClient, PostingClient};
pub use config::EngageConfig;
pub use linking::{LinkBackend, LinkFlow, PollHandle};
pub use session::{Session, SessionStore};
pub use types::*;
