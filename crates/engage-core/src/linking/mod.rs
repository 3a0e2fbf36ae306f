//! ============================================================================
//! Account Linking Module
//! ============================================================================
//! The credential-based link handshake against the engagement service:
//! request -> credential submission -> (optional) status poll -> completion.
//! `LinkFlow` owns the state machine; `LinkBackend` is the seam to the HTTP
//! client so the machine is testable without a network.
//! ============================================================================

mod flow;

pub use flow::{LinkFlow, PollHandle, AUTO_CLOSE_DELAY};

use async_trait::async_trait;

use crate::types::{Credentials, EngageError, LinkRequest, LinkResult, LinkStatus, LinkedAccount};

/// Operations the linking flow and account cache need from the service
#[async_trait]
pub trait LinkBackend: Send + Sync {
    /// Create a new link request and return its id
    async fn begin_link(&self) -> Result<LinkRequest, EngageError>;

    /// Query the current status of an in-flight link request
    async fn link_status(&self, request_id: &str) -> Result<LinkStatus, EngageError>;

    /// Exchange the request id plus credentials for a link result
    async fn complete_link(
        &self,
        request_id: &str,
        credentials: &Credentials,
    ) -> Result<LinkResult, EngageError>;

    /// Fetch the authoritative list of linked accounts
    async fn linked_accounts(&self) -> Result<Vec<LinkedAccount>, EngageError>;

    /// Remove a linked account; `Ok(true)` means the service dropped it
    async fn remove_account(&self, username: &str) -> Result<bool, EngageError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory backend shared by the flow and account-cache tests.

    use super::*;
    use crate::types::{AccountProfile, LinkRequestStatus};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub fn alice_profile() -> AccountProfile {
        AccountProfile {
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
            avatar_url: "http://x/a.png".to_string(),
        }
    }

    pub fn success_result() -> LinkResult {
        LinkResult {
            success: true,
            account: Some(alice_profile()),
            error: None,
        }
    }

    /// Backend whose responses are popped from per-operation queues.
    /// Empty queues fall back to benign defaults (new request, pending
    /// status, successful link for "alice").
    pub struct ScriptedBackend {
        pub begin: Mutex<VecDeque<Result<LinkRequest, EngageError>>>,
        pub status: Mutex<VecDeque<Result<LinkStatus, EngageError>>>,
        pub complete: Mutex<VecDeque<Result<LinkResult, EngageError>>>,
        pub accounts: Mutex<Result<Vec<LinkedAccount>, EngageError>>,
        pub remove: Mutex<Result<bool, EngageError>>,
        pub begin_calls: AtomicUsize,
        pub status_calls: AtomicUsize,
        pub complete_calls: AtomicUsize,
        pub list_calls: AtomicUsize,
        pub remove_calls: AtomicUsize,
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self {
                begin: Mutex::new(VecDeque::new()),
                status: Mutex::new(VecDeque::new()),
                complete: Mutex::new(VecDeque::new()),
                accounts: Mutex::new(Ok(Vec::new())),
                remove: Mutex::new(Ok(true)),
                begin_calls: AtomicUsize::new(0),
                status_calls: AtomicUsize::new(0),
                complete_calls: AtomicUsize::new(0),
                list_calls: AtomicUsize::new(0),
                remove_calls: AtomicUsize::new(0),
            }
        }

        pub fn push_status(&self, status: LinkRequestStatus, error: Option<&str>) {
            self.status.lock().unwrap().push_back(Ok(LinkStatus {
                status,
                error: error.map(str::to_string),
                account: None,
            }));
        }
    }

    #[async_trait]
    impl LinkBackend for ScriptedBackend {
        async fn begin_link(&self) -> Result<LinkRequest, EngageError> {
            self.begin_calls.fetch_add(1, Ordering::SeqCst);
            self.begin
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LinkRequest::new("abc123".to_string())))
        }

        async fn link_status(&self, _request_id: &str) -> Result<LinkStatus, EngageError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.status.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(LinkStatus {
                    status: LinkRequestStatus::Pending,
                    error: None,
                    account: None,
                })
            })
        }

        async fn complete_link(
            &self,
            _request_id: &str,
            _credentials: &Credentials,
        ) -> Result<LinkResult, EngageError> {
            self.complete_calls.fetch_add(1, Ordering::SeqCst);
            self.complete
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(success_result()))
        }

        async fn linked_accounts(&self) -> Result<Vec<LinkedAccount>, EngageError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.accounts.lock().unwrap().clone()
        }

        async fn remove_account(&self, _username: &str) -> Result<bool, EngageError> {
            self.remove_calls.fetch_add(1, Ordering::SeqCst);
            self.remove.lock().unwrap().clone()
        }
    }
}
