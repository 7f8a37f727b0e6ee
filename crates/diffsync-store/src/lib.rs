//! Storage backbone for diffsync.
//!
//! All collaborative state (registrations, shadows, server texts, change
//! logs, selections, heartbeats, colors) lives in one typed key-value
//! store. Components never keep cross-request state of their own; the
//! store is the single shared mutable resource.

pub mod key;
pub mod store;

pub use key::{DocId, Key, KeyError, UserId};
pub use store::{KeyLock, Store, StoreError};
