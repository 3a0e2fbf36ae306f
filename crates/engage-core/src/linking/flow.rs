//! ============================================================================
//! LinkFlow - Account Linking State Machine
//! ============================================================================
//! Drives the handshake `initial -> awaiting_credentials -> processing ->
//! {success | error}` with user-initiated retry from `error`. Transitions
//! happen only through the methods below and are published on a watch
//! channel for the presentation layer. Polling and the post-success
//! auto-close run as explicitly cancellable tasks; every exit path stops
//! them.
//! ============================================================================

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::LinkBackend;
use crate::accounts::AccountManager;
use crate::types::{
    Credentials, EngageError, LinkRequest, LinkRequestStatus, LinkResult, LinkState,
};

/// How long the success confirmation stays up before the flow resets
pub const AUTO_CLOSE_DELAY: Duration = Duration::from_secs(2);

const START_FALLBACK: &str = "Could not start account linking";
const SUBMIT_FALLBACK: &str = "Authentication failed";
const POLL_FALLBACK: &str = "Account linking failed";

/// Handle to a running status-poll task. `stop()` must be called from any
/// exit path the controller itself does not see (e.g. modal unmount).
pub struct PollHandle {
    abort: AbortHandle,
}

impl PollHandle {
    /// Stop the recurring poll immediately
    pub fn stop(&self) {
        self.abort.abort();
    }

    /// Whether the poll task is still scheduled
    pub fn is_active(&self) -> bool {
        !self.abort.is_finished()
    }
}

struct FlowInner {
    state: LinkState,
    request: Option<LinkRequest>,
    /// Bumped on every new attempt and on cancel; external calls that
    /// resolve for a stale attempt are dropped without touching state
    attempt: u64,
    poller: Option<AbortHandle>,
    auto_close: Option<AbortHandle>,
}

/// Controller for one account-linking modal. Cheap to clone; clones share
/// the same state machine.
#[derive(Clone)]
pub struct LinkFlow {
    backend: Arc<dyn LinkBackend>,
    accounts: Arc<AccountManager>,
    inner: Arc<Mutex<FlowInner>>,
    state_tx: watch::Sender<LinkState>,
}

impl LinkFlow {
    pub fn new(backend: Arc<dyn LinkBackend>, accounts: Arc<AccountManager>) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Initial);
        Self {
            backend,
            accounts,
            inner: Arc::new(Mutex::new(FlowInner {
                state: LinkState::Initial,
                request: None,
                attempt: 0,
                poller: None,
                auto_close: None,
            })),
            state_tx,
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> LinkState {
        self.lock().state.clone()
    }

    /// Watch transitions; drives the modal content
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    /// The account cache this flow updates on success
    pub fn accounts(&self) -> &Arc<AccountManager> {
        &self.accounts
    }

    fn lock(&self) -> MutexGuard<'_, FlowInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, inner: &mut FlowInner, next: LinkState) {
        debug!(from = inner.state.name(), to = next.name(), "link flow transition");
        inner.state = next.clone();
        self.state_tx.send_replace(next);
    }

    /// Take the task handles out so they can be aborted after the lock is
    /// released (a poll task may be the caller; aborting it mid-update
    /// would drop the update on the floor)
    fn take_tasks(inner: &mut FlowInner) -> (Option<AbortHandle>, Option<AbortHandle>) {
        (inner.poller.take(), inner.auto_close.take())
    }

    fn abort_tasks(tasks: (Option<AbortHandle>, Option<AbortHandle>)) {
        if let Some(poller) = tasks.0 {
            poller.abort();
        }
        if let Some(auto_close) = tasks.1 {
            auto_close.abort();
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Request a new link from the service and move to `awaiting_credentials`.
    ///
    /// Rejected while a prior attempt is still collecting or exchanging
    /// credentials; allowed again from `initial`, `error`, and `success`.
    /// Service failures land in the `error` state, not in the return value.
    pub async fn start(&self) -> Result<(), EngageError> {
        let attempt = {
            let mut inner = self.lock();
            match inner.state {
                LinkState::Initial | LinkState::Error { .. } | LinkState::Success { .. } => {}
                _ => {
                    error!(
                        state = inner.state.name(),
                        "start() called while a linking attempt is in flight"
                    );
                    return Err(EngageError::InvalidState {
                        operation: "start",
                        state: inner.state.name(),
                    });
                }
            }
            inner.attempt += 1;
            inner.request = None;
            let tasks = Self::take_tasks(&mut inner);
            Self::abort_tasks(tasks);
            inner.attempt
        };

        match self.backend.begin_link().await {
            Ok(request) => {
                let mut inner = self.lock();
                if inner.attempt != attempt {
                    return Ok(());
                }
                info!(request_id = request.request_id, "link request created");
                inner.request = Some(request);
                self.set_state(&mut inner, LinkState::AwaitingCredentials);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "link request could not be created");
                let mut inner = self.lock();
                if inner.attempt != attempt {
                    return Ok(());
                }
                let message = err.display_message(START_FALLBACK);
                self.set_state(&mut inner, LinkState::Error { message });
                Ok(())
            }
        }
    }

    /// Exchange the stored request id plus credentials for a link result.
    ///
    /// Requires `awaiting_credentials`; anywhere else is a caller bug and
    /// returns `InvalidState` without any network traffic. The credentials
    /// are consumed and dropped when the exchange resolves.
    pub async fn submit(&self, credentials: Credentials) -> Result<(), EngageError> {
        let (attempt, request_id) = {
            let mut inner = self.lock();
            let request_id = match (&inner.state, &inner.request) {
                (LinkState::AwaitingCredentials, Some(request)) => request.request_id.clone(),
                _ => {
                    error!(
                        state = inner.state.name(),
                        "submit() requires a started linking attempt"
                    );
                    return Err(EngageError::InvalidState {
                        operation: "submit",
                        state: inner.state.name(),
                    });
                }
            };
            if let Some(request) = inner.request.as_mut() {
                request.status = LinkRequestStatus::Processing;
            }
            self.set_state(&mut inner, LinkState::Processing);
            (inner.attempt, request_id)
        };

        let outcome = self.backend.complete_link(&request_id, &credentials).await;
        drop(credentials);

        match outcome {
            Ok(result) if result.success => {
                self.finish_success(result, attempt).await;
            }
            Ok(result) => {
                let message = result.error.unwrap_or_else(|| SUBMIT_FALLBACK.to_string());
                self.fail(attempt, message);
            }
            Err(err) => {
                warn!(%err, "credential exchange failed");
                self.fail(attempt, err.display_message(SUBMIT_FALLBACK));
            }
        }
        Ok(())
    }

    /// Query the request status once; used for links that complete
    /// out-of-band (e.g. a second factor confirmed elsewhere).
    ///
    /// `completed` and `failed` are terminal; any other status is a no-op.
    /// Transport failures are logged and treated as a no-op so a recurring
    /// poll survives transient outages.
    pub async fn poll_status(&self) -> Result<(), EngageError> {
        let (attempt, request_id) = {
            let inner = self.lock();
            match (&inner.state, &inner.request) {
                (LinkState::AwaitingCredentials | LinkState::Processing, Some(request)) => {
                    (inner.attempt, request.request_id.clone())
                }
                _ => {
                    return Err(EngageError::InvalidState {
                        operation: "poll_status",
                        state: inner.state.name(),
                    });
                }
            }
        };

        match self.backend.link_status(&request_id).await {
            Ok(status) => match status.status {
                LinkRequestStatus::Completed => {
                    let result = LinkResult {
                        success: true,
                        account: status.account,
                        error: None,
                    };
                    self.finish_success(result, attempt).await;
                }
                LinkRequestStatus::Failed => {
                    self.fail(
                        attempt,
                        status.error.unwrap_or_else(|| POLL_FALLBACK.to_string()),
                    );
                }
                _ => {}
            },
            Err(err) => {
                warn!(%err, "status poll failed; will retry on the next tick");
            }
        }
        Ok(())
    }

    /// Spawn a recurring status poll. The returned handle stops it; it also
    /// stops itself on any terminal state, on `cancel()`, and on a new
    /// `start()`.
    pub fn start_polling(&self, period: Duration) -> PollHandle {
        let flow = self.clone();
        let attempt = self.lock().attempt;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval fires immediately; the first poll should wait a period
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if flow.lock().attempt != attempt {
                    break;
                }
                if flow.poll_status().await.is_err() {
                    // flow left the pollable states
                    break;
                }
            }
        });
        let abort = handle.abort_handle();

        let mut inner = self.lock();
        if let Some(previous) = inner.poller.replace(abort.clone()) {
            previous.abort();
        }
        PollHandle { abort }
    }

    /// Abandon the current attempt: stop all timers, discard the in-memory
    /// request, and return to `initial`. Fire-and-forget — the service
    /// expires unused requests on its own. Safe to call from any state.
    pub fn cancel(&self) {
        let tasks = {
            let mut inner = self.lock();
            inner.attempt += 1;
            inner.request = None;
            let tasks = Self::take_tasks(&mut inner);
            if inner.state != LinkState::Initial {
                self.set_state(&mut inner, LinkState::Initial);
            }
            tasks
        };
        Self::abort_tasks(tasks);
    }

    /// User-initiated retry after a failure: back to `awaiting_credentials`
    /// when the request survived, otherwise to `initial` for a fresh
    /// `start()`.
    pub fn retry(&self) -> Result<(), EngageError> {
        let mut inner = self.lock();
        match (&inner.state, &inner.request) {
            (LinkState::Error { .. }, Some(_)) => {
                self.set_state(&mut inner, LinkState::AwaitingCredentials);
                Ok(())
            }
            (LinkState::Error { .. }, None) => {
                self.set_state(&mut inner, LinkState::Initial);
                Ok(())
            }
            _ => Err(EngageError::InvalidState {
                operation: "retry",
                state: inner.state.name(),
            }),
        }
    }

    // ========================================================================
    // Terminal transitions
    // ========================================================================

    async fn finish_success(&self, result: LinkResult, attempt: u64) {
        let tasks = {
            let mut inner = self.lock();
            if inner.attempt != attempt {
                debug!("dropping link result for a superseded attempt");
                return;
            }
            if let Some(request) = inner.request.as_mut() {
                request.status = LinkRequestStatus::Completed;
            }
            let tasks = Self::take_tasks(&mut inner);
            self.set_state(
                &mut inner,
                LinkState::Success {
                    result: result.clone(),
                },
            );
            tasks
        };

        info!(
            account = result.account.as_ref().map(|a| a.username.as_str()),
            "account linked"
        );
        // Update the cache before aborting: the running poll task may be the
        // caller, and aborting it first would cancel this update mid-way.
        self.accounts.absorb_link_result(&result).await;
        Self::abort_tasks(tasks);
        self.spawn_auto_close(attempt);
    }

    fn fail(&self, attempt: u64, message: String) {
        let tasks = {
            let mut inner = self.lock();
            if inner.attempt != attempt {
                debug!("dropping link failure for a superseded attempt");
                return;
            }
            if let Some(request) = inner.request.as_mut() {
                request.status = LinkRequestStatus::Failed;
            }
            let tasks = Self::take_tasks(&mut inner);
            self.set_state(&mut inner, LinkState::Error { message });
            tasks
        };
        Self::abort_tasks(tasks);
    }

    /// Leave the success confirmation up briefly, then reset so the modal
    /// closes on its own
    fn spawn_auto_close(&self, attempt: u64) {
        let flow = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(AUTO_CLOSE_DELAY).await;
            let mut inner = flow.lock();
            if inner.attempt != attempt {
                return;
            }
            inner.auto_close = None;
            inner.request = None;
            flow.set_state(&mut inner, LinkState::Initial);
        });
        self.lock().auto_close = Some(handle.abort_handle());
    }
}
