//! Request-scoped failure taxonomy.
//!
//! Every variant terminates only the current action; nothing here is
//! process-fatal and the server never retries on its own behalf.

use diffsync_store::{DocId, KeyError, StoreError};
use diffsync_textdiff::PatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("no {0} specified")]
    MissingField(&'static str),
    #[error("invalid {0} specified")]
    InvalidField(&'static str),
    #[error(transparent)]
    Path(#[from] KeyError),
    #[error("not registered as collaborator for {0}")]
    NotRegistered(DocId),
    #[error("already registered as collaborator for {0}")]
    AlreadyRegistered(DocId),
    #[error("no shadow or server text for {0}, send a shadow first")]
    InconsistentState(DocId),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("malformed stored payload: {0}")]
    Codec(#[from] serde_json::Error),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
