//! Local key-value replica. Values are JSON, optionally persisted to a file
//! after every write, and every write is announced on a broadcast channel
//! so other mirrors sharing the store can react.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::{broadcast, Mutex};

use crate::mirror::error::MirrorError;

pub const USERS_KEY: &str = "sportsin_users";
pub const POSTS_KEY: &str = "sportsin_posts";
pub const CURRENT_USER_KEY: &str = "sportsin_currentUser";
pub const LOGIN_TIME_KEY: &str = "sportsin_loginTime";
pub const FEED_KEY: &str = "sportsin_feed";
pub const CREDENTIALS_KEY: &str = "sportsin_credentials";

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
}

pub struct LocalStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, serde_json::Value>>,
    events: broadcast::Sender<StoreEvent>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self::with_entries(None, BTreeMap::new())
    }

    /// Open a file-backed store, loading existing entries if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("Opened local store at {}", path.display());
        Ok(Self::with_entries(Some(path), entries))
    }

    fn with_entries(path: Option<PathBuf>, entries: BTreeMap<String, serde_json::Value>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path,
            entries: Mutex::new(entries),
            events,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MirrorError> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), MirrorError> {
        let value = serde_json::to_value(value)?;
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await?;
        drop(entries);
        self.announce(key);
        Ok(())
    }

    /// Returns whether the key was present.
    pub async fn remove(&self, key: &str) -> Result<bool, MirrorError> {
        let mut entries = self.entries.lock().await;
        let existed = entries.remove(key).is_some();
        if existed {
            self.persist(&entries).await?;
            drop(entries);
            self.announce(key);
        }
        Ok(existed)
    }

    /// Read-modify-write of one key under the store lock. A missing key starts
    /// from `T::default()`.
    pub async fn update<T, R, F>(&self, key: &str, f: F) -> Result<R, MirrorError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let mut entries = self.entries.lock().await;
        let mut current: T = match entries.get(key) {
            Some(value) => serde_json::from_value(value.clone())?,
            None => T::default(),
        };
        let result = f(&mut current);
        entries.insert(key.to_string(), serde_json::to_value(&current)?);
        self.persist(&entries).await?;
        drop(entries);
        self.announce(key);
        Ok(result)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn announce(&self, key: &str) {
        // No subscribers is fine.
        let _ = self.events.send(StoreEvent {
            key: key.to_string(),
        });
    }

    async fn persist(&self, entries: &BTreeMap<String, serde_json::Value>) -> Result<(), MirrorError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let store = LocalStore::in_memory();
        let value: Option<Vec<i64>> = store.get(POSTS_KEY).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let store = LocalStore::in_memory();
        store.set(LOGIN_TIME_KEY, &"1700000000000").await.unwrap();
        let value: Option<String> = store.get(LOGIN_TIME_KEY).await.unwrap();
        assert_eq!(value.as_deref(), Some("1700000000000"));
    }

    #[tokio::test]
    async fn update_starts_from_default() {
        let store = LocalStore::in_memory();
        let len = store
            .update(POSTS_KEY, |ids: &mut Vec<i64>| {
                ids.push(1);
                ids.len()
            })
            .await
            .unwrap();
        assert_eq!(len, 1);
        let ids: Vec<i64> = store.get(POSTS_KEY).await.unwrap().unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn writes_are_announced() {
        let store = LocalStore::in_memory();
        let mut events = store.subscribe();

        store.set(CURRENT_USER_KEY, &"someone").await.unwrap();
        assert_eq!(events.recv().await.unwrap().key, CURRENT_USER_KEY);

        assert!(store.remove(CURRENT_USER_KEY).await.unwrap());
        assert_eq!(events.recv().await.unwrap().key, CURRENT_USER_KEY);

        // Removing an absent key is silent.
        assert!(!store.remove(CURRENT_USER_KEY).await.unwrap());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mirror/store.json");

        let store = LocalStore::open(&path).await.unwrap();
        store.set(USERS_KEY, &vec!["a@x.com"]).await.unwrap();
        drop(store);

        let reopened = LocalStore::open(&path).await.unwrap();
        let users: Vec<String> = reopened.get(USERS_KEY).await.unwrap().unwrap();
        assert_eq!(users, vec!["a@x.com".to_string()]);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn type_mismatch_is_a_store_error() {
        let store = LocalStore::in_memory();
        store.set(POSTS_KEY, &"not a list").await.unwrap();
        let result: Result<Option<Vec<i64>>, _> = store.get(POSTS_KEY).await;
        assert!(matches!(result, Err(MirrorError::Store(_))));
    }
}
