//! Registration registry: which (document, user) pairs are subscribed.
//!
//! A registration is an existence marker in the store. It gates every
//! per-document write action and feeds the roster queries; presence
//! reaping tears registrations down in bulk when a session goes stale.

use std::sync::Arc;

use diffsync_store::{DocId, Key, Store, UserId};

use crate::error::CollabError;

#[derive(Clone)]
pub struct Registry {
    store: Arc<Store>,
}

impl Registry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn key(doc: &DocId, user: &UserId) -> Key {
        Key::Registration {
            doc: doc.clone(),
            user: user.clone(),
        }
    }

    pub fn register(&self, doc: &DocId, user: &UserId) -> Result<(), CollabError> {
        let key = Self::key(doc, user);
        if self.store.exists(&key) {
            return Err(CollabError::AlreadyRegistered(doc.clone()));
        }
        self.store.put(key, Vec::new());
        Ok(())
    }

    pub fn unregister(&self, doc: &DocId, user: &UserId) -> Result<(), CollabError> {
        let key = Self::key(doc, user);
        if !self.store.exists(&key) {
            return Err(CollabError::NotRegistered(doc.clone()));
        }
        self.store.delete(&key);
        Ok(())
    }

    /// Removes every registration the user holds, across all documents.
    /// Holding none is not an error.
    pub fn unregister_all(&self, user: &UserId) {
        let keys = self
            .store
            .scan(|k| matches!(k, Key::Registration { .. }) && k.user() == Some(user));
        for key in keys {
            self.store.delete(&key);
        }
    }

    pub fn is_registered(&self, doc: &DocId, user: &UserId) -> bool {
        self.store.exists(&Self::key(doc, user))
    }

    pub fn list_users(&self, doc: &DocId) -> Vec<UserId> {
        self.store
            .scan(|k| matches!(k, Key::Registration { .. }) && k.doc() == Some(doc))
            .into_iter()
            .filter_map(|k| k.user().cloned())
            .collect()
    }
}
