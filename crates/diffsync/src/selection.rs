//! Latest cursor/selection per (document, user).
//!
//! The payload is opaque to the server and fully overwritten on every
//! update; only the newest value is ever served.

use std::sync::Arc;

use diffsync_store::{DocId, Key, Store, UserId};
use serde_json::Value;

use crate::error::CollabError;
use crate::registry::Registry;

#[derive(Clone)]
pub struct SelectionStore {
    store: Arc<Store>,
    registry: Registry,
}

impl SelectionStore {
    pub fn new(store: Arc<Store>, registry: Registry) -> Self {
        Self { store, registry }
    }

    fn key(doc: &DocId, user: &UserId) -> Key {
        Key::Selection {
            doc: doc.clone(),
            user: user.clone(),
        }
    }

    /// Stores the caller's current selection. The caller must be
    /// registered to the document.
    pub fn set(&self, doc: &DocId, user: &UserId, payload: &Value) -> Result<(), CollabError> {
        if !self.registry.is_registered(doc, user) {
            return Err(CollabError::NotRegistered(doc.clone()));
        }
        self.store
            .put(Self::key(doc, user), serde_json::to_vec(payload)?);
        Ok(())
    }

    pub fn get(&self, doc: &DocId, user: &UserId) -> Result<Option<Value>, CollabError> {
        match self.store.get(&Self::key(doc, user)) {
            None => Ok(None),
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        }
    }

    /// Deletes the user's selections for every document.
    pub fn remove_all_for_user(&self, user: &UserId) {
        let keys = self
            .store
            .scan(|k| matches!(k, Key::Selection { .. }) && k.user() == Some(user));
        for key in keys {
            self.store.delete(&key);
        }
    }
}
