//! Persisted session storage.
//!
//! Stores issued credentials in `<home>/session.json` with restricted
//! permissions (0600), keyed by client ID and username, with a
//! last-authenticated-user pointer per client.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::StoreError;
use super::jwt;
use crate::config::paths;

/// A full set of issued credentials bound to a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSet {
    pub username: String,
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Persisted token record for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenRecord {
    id_token: String,
    access_token: String,
    refresh_token: String,
}

/// On-disk session cache structure.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SessionCache {
    /// `"{client_id}.{username}"` -> token record.
    #[serde(default)]
    entries: HashMap<String, TokenRecord>,
    /// client_id -> last authenticated username.
    #[serde(default)]
    last_auth_user: HashMap<String, String>,
}

impl SessionCache {
    fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let contents =
            serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialize(e.to_string()))?;

        // Write with restricted permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            file.write_all(contents.as_bytes())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        Ok(())
    }
}

/// Session store scoped to one app client.
///
/// Reads are side-effect free; writes happen only on login success, callback
/// success, and logout.
pub struct SessionStore {
    path: PathBuf,
    client_id: String,
}

impl SessionStore {
    /// Creates a store backed by the default session path.
    pub fn new(client_id: &str) -> Self {
        Self::with_path(paths::session_path(), client_id)
    }

    /// Creates a store backed by a specific file (used by tests).
    pub fn with_path(path: PathBuf, client_id: &str) -> Self {
        Self {
            path,
            client_id: client_id.to_string(),
        }
    }

    fn entry_key(&self, username: &str) -> String {
        format!("{}.{}", self.client_id, username)
    }

    /// Returns the last-known user's session, or `None` if no user is
    /// recorded, the cache is unreadable, or the stored identity token is
    /// expired/undecodable.
    pub fn current_session(&self) -> Option<CredentialSet> {
        let cache = match SessionCache::load(&self.path) {
            Ok(cache) => cache,
            Err(e) => {
                debug!("session cache unreadable: {e}");
                return None;
            }
        };

        let username = cache.last_auth_user.get(&self.client_id)?;
        let record = cache.entries.get(&self.entry_key(username))?;

        if jwt::is_expired(&record.id_token) {
            debug!("stored session for {username} is expired");
            return None;
        }

        Some(CredentialSet {
            username: username.clone(),
            id_token: record.id_token.clone(),
            access_token: record.access_token.clone(),
            refresh_token: record.refresh_token.clone(),
        })
    }

    /// Persists a credential set and marks its user as last authenticated.
    pub fn persist(&self, creds: &CredentialSet) -> Result<(), StoreError> {
        let mut cache = SessionCache::load(&self.path)?;

        cache.entries.insert(
            self.entry_key(&creds.username),
            TokenRecord {
                id_token: creds.id_token.clone(),
                access_token: creds.access_token.clone(),
                refresh_token: creds.refresh_token.clone(),
            },
        );
        cache
            .last_auth_user
            .insert(self.client_id.clone(), creds.username.clone());

        cache.save(&self.path)
    }

    /// Removes the last-authenticated user's tokens and pointer.
    ///
    /// Returns whether credentials were present.
    pub fn clear(&self) -> Result<bool, StoreError> {
        let mut cache = SessionCache::load(&self.path)?;

        let Some(username) = cache.last_auth_user.remove(&self.client_id) else {
            return Ok(false);
        };
        let had_entry = cache.entries.remove(&self.entry_key(&username)).is_some();

        cache.save(&self.path)?;
        Ok(had_entry)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::super::jwt::testutil::make_jwt;
    use super::*;

    fn make_creds(username: &str, exp: i64) -> CredentialSet {
        CredentialSet {
            username: username.to_string(),
            id_token: make_jwt(&json!({"cognito:username": username, "exp": exp})),
            access_token: "access-token-value".to_string(),
            refresh_token: "refresh-token-value".to_string(),
        }
    }

    const FUTURE_EXP: i64 = 4_102_444_800; // 2100-01-01

    /// No session file: current_session is None.
    #[test]
    fn test_current_session_none_when_missing() {
        let dir = tempdir().unwrap();
        let store = SessionStore::with_path(dir.path().join("session.json"), "client-1");
        assert!(store.current_session().is_none());
    }

    /// Persist then read back.
    #[test]
    fn test_persist_and_current_session() {
        let dir = tempdir().unwrap();
        let store = SessionStore::with_path(dir.path().join("session.json"), "client-1");

        let creds = make_creds("alice", FUTURE_EXP);
        store.persist(&creds).unwrap();

        let restored = store.current_session().unwrap();
        assert_eq!(restored, creds);
    }

    /// Expired identity token: current_session is None even though the
    /// record is present.
    #[test]
    fn test_current_session_none_when_expired() {
        let dir = tempdir().unwrap();
        let store = SessionStore::with_path(dir.path().join("session.json"), "client-1");

        store.persist(&make_creds("alice", 1_000_000)).unwrap();
        assert!(store.current_session().is_none());
    }

    /// Corrupt cache file: current_session is None, not an error.
    #[test]
    fn test_current_session_none_on_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::with_path(path, "client-1");
        assert!(store.current_session().is_none());
    }

    /// Clear removes the entry and the last-user pointer.
    #[test]
    fn test_clear_removes_entry_and_pointer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::with_path(path.clone(), "client-1");

        store.persist(&make_creds("alice", FUTURE_EXP)).unwrap();
        assert!(store.clear().unwrap());
        assert!(store.current_session().is_none());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("alice"));

        // Clearing again reports nothing to remove.
        assert!(!store.clear().unwrap());
    }

    /// Entries are namespaced per client: a second client does not see the
    /// first client's session.
    #[test]
    fn test_sessions_namespaced_by_client() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store_a = SessionStore::with_path(path.clone(), "client-a");
        store_a.persist(&make_creds("alice", FUTURE_EXP)).unwrap();

        let store_b = SessionStore::with_path(path, "client-b");
        assert!(store_b.current_session().is_none());
        assert!(store_a.current_session().is_some());
    }

    /// Persisting a second user moves the last-user pointer.
    #[test]
    fn test_last_user_pointer_follows_login() {
        let dir = tempdir().unwrap();
        let store = SessionStore::with_path(dir.path().join("session.json"), "client-1");

        store.persist(&make_creds("alice", FUTURE_EXP)).unwrap();
        store.persist(&make_creds("bob", FUTURE_EXP)).unwrap();

        assert_eq!(store.current_session().unwrap().username, "bob");
    }

    #[cfg(unix)]
    /// Session file is written with owner-only permissions.
    #[test]
    fn test_session_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::with_path(path.clone(), "client-1");
        store.persist(&make_creds("alice", FUTURE_EXP)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
