//! Collaborative text editing backend.
//!
//! Multiple clients edit the same document and converge through a
//! central server using shadow-copy differential synchronization: each
//! round the client sends a patch against the last common state, the
//! server folds it into the canonical text and returns a patch carrying
//! everything other collaborators contributed in the meantime.
//!
//! Alongside synchronization the crate tracks presence (heartbeats with
//! lazy reaping of dead sessions), per-document registrations, display
//! colors, an ordered per-user change log for catch-up reads, and the
//! latest selection per collaborator. All state lives in the
//! [`diffsync_store`] backbone; request handling is stateless.

pub mod changes;
pub mod clock;
pub mod colors;
pub mod error;
pub mod presence;
pub mod registry;
pub mod selection;
pub mod service;
pub mod sync;

pub use changes::{ChangeLog, ChangeRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use colors::{ColorAllocator, FALLBACK_COLOR, PALETTE};
pub use error::CollabError;
pub use presence::{Presence, MAX_HEARTBEAT_INTERVAL};
pub use registry::Registry;
pub use selection::SelectionStore;
pub use service::{Collab, Response};
pub use sync::{SyncEngine, DEFAULT_LOCK_TIMEOUT};

pub use diffsync_store::{DocId, Key, Store, StoreError, UserId};
pub use diffsync_textdiff::{CharDiff, DiffEngine, Patch};
