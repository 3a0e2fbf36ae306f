//! ============================================================================
//! AccountManager - Linked Account Cache
//! ============================================================================
//! Client-side cache of the user's linked platform accounts, keyed by
//! username. The service owns the authoritative list; removals go remote
//! first and only land in the cache once the service confirms them. At most
//! one account carries the default flag.
//! ============================================================================

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::linking::LinkBackend;
use crate::types::{EngageError, LinkResult, LinkedAccount};

/// Best-effort cache over the service's linked-account list
pub struct AccountManager {
    backend: Arc<dyn LinkBackend>,
    cache: Mutex<Vec<LinkedAccount>>,
}

impl AccountManager {
    pub fn new(backend: Arc<dyn LinkBackend>) -> Self {
        Self {
            backend,
            cache: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LinkedAccount>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the cached accounts
    pub fn list(&self) -> Vec<LinkedAccount> {
        self.lock().clone()
    }

    /// The account used when none is named explicitly
    pub fn default_account(&self) -> Option<LinkedAccount> {
        self.lock().iter().find(|a| a.is_default).cloned()
    }

    /// Replace the cache with the service's current list
    pub async fn refresh(&self) -> Result<Vec<LinkedAccount>, EngageError> {
        let mut fetched = self.backend.linked_accounts().await?;
        normalize_default(&mut fetched);
        let mut cache = self.lock();
        *cache = fetched.clone();
        debug!(count = fetched.len(), "linked account cache refreshed");
        Ok(fetched)
    }

    /// Insert or update an account locally. The first account, or any
    /// account added while no default exists, becomes the default.
    pub fn add(&self, mut account: LinkedAccount) {
        let mut cache = self.lock();
        let has_default = cache.iter().any(|a| a.is_default);
        match cache.iter_mut().find(|a| a.username == account.username) {
            Some(existing) => {
                account.is_default = existing.is_default;
                *existing = account;
            }
            None => {
                account.is_default = !has_default;
                cache.push(account);
            }
        }
    }

    /// Remove an account. The DELETE goes out first; the cache is only
    /// touched once the service confirms. Returns whether the service
    /// dropped the account.
    pub async fn remove(&self, username: &str) -> Result<bool, EngageError> {
        let removed = self.backend.remove_account(username).await?;
        if !removed {
            warn!(username, "service declined to remove linked account");
            return Ok(false);
        }

        let mut cache = self.lock();
        let before = cache.len();
        let was_default = cache
            .iter()
            .any(|a| a.username == username && a.is_default);
        cache.retain(|a| a.username != username);
        if was_default {
            if let Some(first) = cache.first_mut() {
                first.is_default = true;
            }
        }
        if cache.len() < before {
            info!(username, "linked account removed");
        }
        Ok(true)
    }

    /// Make `username` the default. Local-only; a no-op when the account is
    /// not cached.
    pub fn set_default(&self, username: &str) {
        let mut cache = self.lock();
        if !cache.iter().any(|a| a.username == username) {
            debug!(username, "set_default ignored for unknown account");
            return;
        }
        for account in cache.iter_mut() {
            account.is_default = account.username == username;
        }
    }

    /// Fold a successful link into the cache: prefer a fresh fetch from the
    /// service, fall back to synthesizing an entry from the result payload.
    pub(crate) async fn absorb_link_result(&self, result: &LinkResult) {
        match self.refresh().await {
            Ok(list) if !list.is_empty() => return,
            Ok(_) => debug!("account fetch returned nothing; using link result payload"),
            Err(err) => warn!(%err, "account fetch failed; using link result payload"),
        }
        if let Some(profile) = &result.account {
            self.add(LinkedAccount::from_profile(profile.clone()));
        }
    }
}

/// Keep the single-default invariant when adopting a server list
fn normalize_default(accounts: &mut [LinkedAccount]) {
    let mut seen = false;
    for account in accounts.iter_mut() {
        if account.is_default {
            if seen {
                account.is_default = false;
            }
            seen = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linking::testing::ScriptedBackend;

    fn account(username: &str) -> LinkedAccount {
        LinkedAccount {
            username: username.to_string(),
            display_name: username.to_uppercase(),
            avatar_url: format!("http://x/{}.png", username),
            is_default: false,
            is_active: true,
        }
    }

    fn manager() -> (Arc<ScriptedBackend>, AccountManager) {
        let backend = Arc::new(ScriptedBackend::new());
        let manager = AccountManager::new(backend.clone());
        (backend, manager)
    }

    #[test]
    fn first_account_becomes_default() {
        let (_backend, manager) = manager();
        manager.add(account("alice"));

        let cached = manager.list();
        assert_eq!(cached.len(), 1);
        assert!(cached[0].is_default);
    }

    #[test]
    fn second_account_does_not_steal_the_default() {
        let (_backend, manager) = manager();
        manager.add(account("alice"));
        manager.add(account("bob"));

        assert_eq!(manager.default_account().unwrap().username, "alice");
    }

    #[test]
    fn upsert_preserves_the_default_flag() {
        let (_backend, manager) = manager();
        manager.add(account("alice"));
        let mut updated = account("alice");
        updated.display_name = "Alice Updated".to_string();
        manager.add(updated);

        let cached = manager.list();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].display_name, "Alice Updated");
        assert!(cached[0].is_default);
    }

    #[test]
    fn set_default_on_unknown_username_is_a_noop() {
        let (_backend, manager) = manager();
        manager.add(account("alice"));

        manager.set_default("bob");

        let cached = manager.list();
        assert_eq!(cached.len(), 1);
        assert!(cached[0].is_default);
    }

    #[test]
    fn set_default_leaves_exactly_one_default() {
        let (_backend, manager) = manager();
        manager.add(account("alice"));
        manager.add(account("bob"));

        manager.set_default("bob");

        let defaults: Vec<_> = manager.list().into_iter().filter(|a| a.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].username, "bob");

        // idempotent regardless of the prior configuration
        manager.set_default("bob");
        let defaults: Vec<_> = manager.list().into_iter().filter(|a| a.is_default).collect();
        assert_eq!(defaults.len(), 1);
    }

    #[tokio::test]
    async fn remove_only_mutates_the_cache_on_confirmed_success() {
        let (backend, manager) = manager();
        manager.add(account("alice"));

        *backend.remove.lock().unwrap() = Ok(false);
        assert!(!manager.remove("alice").await.unwrap());
        assert_eq!(manager.list().len(), 1);

        *backend.remove.lock().unwrap() = Err(EngageError::ServiceUnavailable("down".to_string()));
        assert!(manager.remove("alice").await.is_err());
        assert_eq!(manager.list().len(), 1);

        *backend.remove.lock().unwrap() = Ok(true);
        assert!(manager.remove("alice").await.unwrap());
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn removing_the_default_promotes_the_next_account() {
        let (_backend, manager) = manager();
        manager.add(account("alice"));
        manager.add(account("bob"));

        assert!(manager.remove("alice").await.unwrap());

        let cached = manager.list();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].username, "bob");
        assert!(cached[0].is_default);
    }

    #[tokio::test]
    async fn refresh_normalizes_multiple_server_side_defaults() {
        let (backend, manager) = manager();
        let mut a = account("alice");
        a.is_default = true;
        let mut b = account("bob");
        b.is_default = true;
        *backend.accounts.lock().unwrap() = Ok(vec![a, b]);

        let fetched = manager.refresh().await.unwrap();
        let defaults: Vec<_> = fetched.into_iter().filter(|x| x.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].username, "alice");
    }
}
