//! Differential synchronization engine.
//!
//! Per document the server keeps one canonical text and, per user, a
//! shadow: the last state known common to that user's client and the
//! server. A synchronization round folds the client's patch into both,
//! then returns a patch carrying whatever the canonical text already
//! contained beyond the client's edits, which the client applies
//! locally to converge.

use std::sync::Arc;
use std::time::Duration;

use diffsync_store::{DocId, Key, Store, UserId};
use diffsync_textdiff::{CharDiff, DiffEngine};

use crate::error::CollabError;

/// Bounded wait for the ServerText/Shadow exclusive scopes; contended
/// rounds fail with a lock-timeout error instead of stalling.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SyncEngine<D: DiffEngine = CharDiff> {
    store: Arc<Store>,
    engine: D,
    lock_timeout: Duration,
}

impl<D: DiffEngine> SyncEngine<D> {
    pub fn new(store: Arc<Store>, engine: D) -> Self {
        Self {
            store,
            engine,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn text_key(doc: &DocId) -> Key {
        Key::ServerText { doc: doc.clone() }
    }

    fn shadow_key(doc: &DocId, user: &UserId) -> Key {
        Key::Shadow {
            doc: doc.clone(),
            user: user.clone(),
        }
    }

    /// Bootstrap for a synchronization session: overwrites the caller's
    /// shadow with the text they reported and, when the document has no
    /// canonical text yet, establishes it from that same state.
    pub fn send_shadow(&self, doc: &DocId, user: &UserId, text: &str) -> Result<(), CollabError> {
        let text_key = Self::text_key(doc);
        let shadow_key = Self::shadow_key(doc, user);

        // ServerText before Shadow, the one global lock order.
        let _text_guard = self.store.lock(&text_key, self.lock_timeout)?;
        let _shadow_guard = self.store.lock(&shadow_key, self.lock_timeout)?;

        self.store.put(shadow_key, text.as_bytes().to_vec());
        if !self.store.exists(&text_key) {
            self.store.put(text_key, text.as_bytes().to_vec());
        }
        Ok(())
    }

    /// One synchronization round. Requires a prior [`send_shadow`]
    /// bootstrap for this (document, user); returns the serialized
    /// return patch the caller must apply to its local text.
    ///
    /// [`send_shadow`]: Self::send_shadow
    pub fn synchronize(
        &self,
        doc: &DocId,
        user: &UserId,
        patch_wire: &str,
    ) -> Result<String, CollabError> {
        let text_key = Self::text_key(doc);
        let shadow_key = Self::shadow_key(doc, user);
        if !self.store.exists(&text_key) || !self.store.exists(&shadow_key) {
            return Err(CollabError::InconsistentState(doc.clone()));
        }
        debug_assert!(text_key < shadow_key);

        let _text_guard = self.store.lock(&text_key, self.lock_timeout)?;
        let _shadow_guard = self.store.lock(&shadow_key, self.lock_timeout)?;

        let server = self.read_text(&text_key);
        let shadow = self.read_text(&shadow_key);
        let client_patch = self.engine.parse(patch_wire)?;

        // Fold the client's edits into both copies, then capture what
        // the canonical text already held beyond them.
        let new_server = self.engine.apply(&client_patch, &server);
        let advanced_shadow = self.engine.apply(&client_patch, &shadow);
        let return_patch = self.engine.diff(&advanced_shadow, &new_server);
        let new_shadow = self.engine.apply(&return_patch, &advanced_shadow);

        self.store.put(text_key, new_server.into_bytes());
        self.store.put(shadow_key, new_shadow.into_bytes());
        Ok(self.engine.serialize(&return_patch))
    }

    pub fn server_text(&self, doc: &DocId) -> Option<String> {
        self.store
            .get(&Self::text_key(doc))
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    pub fn shadow(&self, doc: &DocId, user: &UserId) -> Option<String> {
        self.store
            .get(&Self::shadow_key(doc, user))
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    /// Deletes the canonical text of every document.
    pub fn remove_all_server_texts(&self) {
        let keys = self.store.scan(|k| matches!(k, Key::ServerText { .. }));
        for key in keys {
            self.store.delete(&key);
        }
    }

    /// Deletes the user's shadows for every document. The next
    /// synchronization attempt needs a fresh [`send_shadow`] bootstrap.
    ///
    /// [`send_shadow`]: Self::send_shadow
    pub fn remove_all_shadows_for_user(&self, user: &UserId) {
        let keys = self
            .store
            .scan(|k| matches!(k, Key::Shadow { .. }) && k.user() == Some(user));
        for key in keys {
            self.store.delete(&key);
        }
    }

    fn read_text(&self, key: &Key) -> String {
        self.store
            .get(key)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }
}
