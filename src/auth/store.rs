use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Token file name in the storage directory
const TOKEN_FILE: &str = "tokens.json";

/// An access/refresh token pair as issued by the identity backend.
///
/// Both tokens are opaque bearer credentials. The pair is all-or-nothing:
/// a document missing either field is treated as no session at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.access.is_empty() && !self.refresh.is_empty()
    }
}

/// Durable storage for the current token pair.
///
/// Holds an in-memory mirror of the persisted file; every mutation updates
/// both under one lock, so `set`, `replace_access`, and `clear` never
/// interleave and readers never observe a half-written pair.
pub struct TokenStore {
    path: PathBuf,
    inner: Mutex<Option<TokenPair>>,
}

impl TokenStore {
    /// Open the store backed by `tokens.json` in the given directory,
    /// loading any previously persisted pair.
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self> {
        let path = storage_dir.as_ref().join(TOKEN_FILE);
        let pair = Self::load_file(&path)?;

        Ok(Self {
            path,
            inner: Mutex::new(pair),
        })
    }

    fn load_file(path: &Path) -> Result<Option<TokenPair>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read token file")?;
        match serde_json::from_str::<TokenPair>(&contents) {
            Ok(pair) if pair.is_complete() => Ok(Some(pair)),
            Ok(_) => {
                // Partial pair on disk is treated as no session
                warn!(path = %path.display(), "Token file is missing a field, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Token file is unreadable, ignoring");
                Ok(None)
            }
        }
    }

    /// Current pair, if any.
    pub fn get(&self) -> Option<TokenPair> {
        self.inner.lock().unwrap().clone()
    }

    /// Current access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.inner.lock().unwrap().as_ref().map(|p| p.access.clone())
    }

    /// Current refresh token, if any.
    pub fn refresh_token(&self) -> Option<String> {
        self.inner.lock().unwrap().as_ref().map(|p| p.refresh.clone())
    }

    /// Overwrite both tokens.
    pub fn set(&self, pair: TokenPair) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        self.persist(&pair)?;
        *guard = Some(pair);
        debug!("Token pair stored");
        Ok(())
    }

    /// Replace only the access token, keeping the stored refresh token.
    ///
    /// No-op when the store is empty: a logout that raced the refresh must
    /// not be resurrected into a partial pair.
    pub fn replace_access(&self, access: &str) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        match guard.as_mut() {
            Some(pair) => {
                let updated = TokenPair::new(access, pair.refresh.clone());
                self.persist(&updated)?;
                *pair = updated;
                debug!("Access token replaced");
            }
            None => {
                warn!("Ignoring access token update: store is empty");
            }
        }
        Ok(())
    }

    /// Remove both tokens. Idempotent.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        *guard = None;
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove token file")?;
        }
        debug!("Token store cleared");
        Ok(())
    }

    fn persist(&self, pair: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }
        let contents = serde_json::to_string_pretty(pair)?;
        std::fs::write(&self.path, contents).context("Failed to write token file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, TokenStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_set_then_get_returns_exact_pair() {
        let (_dir, store) = temp_store();
        let pair = TokenPair::new("A1", "R1");
        store.set(pair.clone()).unwrap();
        assert_eq!(store.get(), Some(pair));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (_dir, store) = temp_store();
        store.set(TokenPair::new("A1", "R1")).unwrap();
        store.clear().unwrap();
        assert_eq!(store.get(), None);
        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_replace_access_preserves_refresh() {
        let (_dir, store) = temp_store();
        store.set(TokenPair::new("A1", "R1")).unwrap();
        store.replace_access("A2").unwrap();
        assert_eq!(store.get(), Some(TokenPair::new("A2", "R1")));
    }

    #[test]
    fn test_replace_access_on_empty_store_is_noop() {
        let (_dir, store) = temp_store();
        store.replace_access("A2").unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_pair_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TokenStore::open(dir.path()).unwrap();
            store.set(TokenPair::new("A1", "R1")).unwrap();
        }
        let store = TokenStore::open(dir.path()).unwrap();
        assert_eq!(store.get(), Some(TokenPair::new("A1", "R1")));
    }

    #[test]
    fn test_partial_file_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tokens.json"),
            r#"{"access": "A1", "refresh": ""}"#,
        )
        .unwrap();
        let store = TokenStore::open(dir.path()).unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tokens.json"), "not json").unwrap();
        let store = TokenStore::open(dir.path()).unwrap();
        assert_eq!(store.get(), None);
    }
}
