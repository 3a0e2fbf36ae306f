// ============================================================================
// SessionStore — Persisted Dashboard Session (redb)
// ============================================================================
// Process-wide session state made explicit: the token and user profile are
// read from the embedded database at startup, written on login, and removed
// on logout. Callers pass the loaded session around; nothing mutates it
// ambiently.
// Default path: ~/.xengage/engage.redb (override via ENGAGE_DB_PATH env var)
// ============================================================================

use anyhow::{anyhow, Result};
use redb::{Database, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{AuthResponse, UserProfile};

const SESSION: TableDefinition<&str, &[u8]> = TableDefinition::new("session");

const CURRENT_KEY: &str = "current";

/// An authenticated dashboard session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: i64,
    pub user: UserProfile,
}

impl Session {
    /// Build a session from a login response
    pub fn from_auth(auth: AuthResponse) -> Self {
        Self {
            access_token: auth.access_token,
            token_type: auth.token_type,
            expires_at: chrono::Utc::now().timestamp() + auth.expires_in,
            user: auth.user,
        }
    }

    /// Check whether the token is expired (with a 5 min buffer)
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at <= now + 300
    }
}

/// Embedded store for the current session
pub struct SessionStore {
    db: Database,
    path: PathBuf,
}

impl SessionStore {
    /// Open (or create) the store at the given path.
    /// If `path` is None, uses ENGAGE_DB_PATH env var or ~/.xengage/engage.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("ENGAGE_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let dir = home.join(".xengage");
            std::fs::create_dir_all(&dir)
                .map_err(|e| anyhow!("Failed to create .xengage directory: {}", e))?;
            dir.join("engage.redb")
        };

        debug!("Opening session store at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open session store: {}", e))?;

        // Ensure the table exists by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(SESSION)
                .map_err(|e| anyhow!("Failed to create session table: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted session, if any
    pub fn current(&self) -> Result<Option<Session>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(SESSION)
            .map_err(|e| anyhow!("Failed to open session table: {}", e))?;

        match table
            .get(CURRENT_KEY)
            .map_err(|e| anyhow!("Failed to get session: {}", e))?
        {
            Some(value) => {
                let session: Session = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize session: {}", e))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Persist the session (login)
    pub fn store(&self, session: &Session) -> Result<()> {
        let value = bincode::serialize(session)
            .map_err(|e| anyhow!("Failed to serialize session: {}", e))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(SESSION)
                .map_err(|e| anyhow!("Failed to open session table: {}", e))?;
            table
                .insert(CURRENT_KEY, value.as_slice())
                .map_err(|e| anyhow!("Failed to insert session: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!(user = session.user.user_id, "session stored");
        Ok(())
    }

    /// Remove the persisted session (logout)
    pub fn clear(&self) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(SESSION)
                .map_err(|e| anyhow!("Failed to open session table: {}", e))?;
            table
                .remove(CURRENT_KEY)
                .map_err(|e| anyhow!("Failed to remove session: {}", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!("session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> SessionStore {
        let path = std::env::temp_dir().join(format!("engage-test-{}.redb", uuid::Uuid::new_v4()));
        SessionStore::open(Some(path.to_str().unwrap())).unwrap()
    }

    fn session() -> Session {
        Session {
            access_token: "token-123".to_string(),
            token_type: "bearer".to_string(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
            user: UserProfile {
                user_id: "u-1".to_string(),
                email: "alice@example.com".to_string(),
                name: Some("Alice".to_string()),
            },
        }
    }

    #[test]
    fn test_session_round_trip() {
        let store = temp_store();
        assert!(store.current().unwrap().is_none());

        let s = session();
        store.store(&s).unwrap();
        assert_eq!(store.current().unwrap(), Some(s));

        store.clear().unwrap();
        assert!(store.current().unwrap().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = temp_store();
        store.clear().unwrap();
        store.clear().unwrap();
    }

    #[test]
    fn test_session_expiry_buffer() {
        let mut s = session();
        assert!(!s.is_expired());

        s.expires_at = chrono::Utc::now().timestamp() + 100;
        assert!(s.is_expired()); // inside the 5 min buffer

        s.expires_at = chrono::Utc::now().timestamp() - 100;
        assert!(s.is_expired());
    }
}
