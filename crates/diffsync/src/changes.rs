//! Append-only, revision-numbered change log per (document, user).
//!
//! Revisions are gap-free and start at 0 for each writer. The
//! read-increment-write sequence holds the change-log key's lock so
//! concurrent submissions from the same writer cannot lose updates.

use std::sync::Arc;
use std::time::Duration;

use diffsync_store::{DocId, Key, Store, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollabError;
use crate::registry::Registry;

const APPEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Server-assigned position in this writer's log.
    pub revision: u64,
    pub payload: Value,
}

#[derive(Clone)]
pub struct ChangeLog {
    store: Arc<Store>,
    registry: Registry,
}

impl ChangeLog {
    pub fn new(store: Arc<Store>, registry: Registry) -> Self {
        Self { store, registry }
    }

    fn key(doc: &DocId, user: &UserId) -> Key {
        Key::Changes {
            doc: doc.clone(),
            user: user.clone(),
        }
    }

    /// Appends `payload` at the next revision and returns that revision.
    /// The caller must be registered to the document.
    pub fn append(&self, doc: &DocId, user: &UserId, payload: Value) -> Result<u64, CollabError> {
        if !self.registry.is_registered(doc, user) {
            return Err(CollabError::NotRegistered(doc.clone()));
        }
        let key = Self::key(doc, user);
        let _guard = self.store.lock(&key, APPEND_TIMEOUT)?;
        let mut records = self.read(&key)?;
        let revision = records.last().map_or(0, |r| r.revision + 1);
        records.push(ChangeRecord { revision, payload });
        self.store.put(key, serde_json::to_vec(&records)?);
        Ok(revision)
    }

    /// All records with revision at or after `from`, in revision order.
    pub fn since(
        &self,
        doc: &DocId,
        user: &UserId,
        from: u64,
    ) -> Result<Vec<ChangeRecord>, CollabError> {
        let records = self.read(&Self::key(doc, user))?;
        Ok(records.into_iter().filter(|r| r.revision >= from).collect())
    }

    /// Deletes the user's change logs for every document.
    pub fn remove_all_for_user(&self, user: &UserId) {
        let keys = self
            .store
            .scan(|k| matches!(k, Key::Changes { .. }) && k.user() == Some(user));
        for key in keys {
            self.store.delete(&key);
        }
    }

    fn read(&self, key: &Key) -> Result<Vec<ChangeRecord>, CollabError> {
        match self.store.get(key) {
            None => Ok(Vec::new()),
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }
}
