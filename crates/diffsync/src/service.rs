//! Action dispatch and the uniform response envelope.
//!
//! [`Collab`] wires every component over one shared store and maps the
//! wire-level actions onto them. The acting user comes from the
//! external authentication layer, never from request fields; requests
//! are JSON objects carrying an `action` name plus per-action fields.

use std::sync::Arc;

use diffsync_store::{DocId, Store, UserId};
use diffsync_textdiff::{CharDiff, DiffEngine};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::changes::ChangeLog;
use crate::clock::Clock;
use crate::colors::ColorAllocator;
use crate::error::CollabError;
use crate::presence::Presence;
use crate::registry::Registry;
use crate::selection::SelectionStore;
use crate::sync::SyncEngine;

/// Uniform response envelope: `{status:"success", data?}` or
/// `{status:"error", message}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            status: "success",
            data,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

pub struct Collab<D: DiffEngine = CharDiff> {
    registry: Registry,
    presence: Presence,
    colors: ColorAllocator,
    sync: SyncEngine<D>,
    changes: ChangeLog,
    selections: SelectionStore,
}

impl Collab<CharDiff> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_engine(Store::new(), clock, CharDiff::new())
    }
}

impl<D: DiffEngine> Collab<D> {
    pub fn with_engine(store: Arc<Store>, clock: Arc<dyn Clock>, engine: D) -> Self {
        let registry = Registry::new(Arc::clone(&store));
        let colors = ColorAllocator::new(Arc::clone(&store), Arc::clone(&clock));
        let presence = Presence::new(
            Arc::clone(&store),
            clock,
            registry.clone(),
            colors.clone(),
        );
        let sync = SyncEngine::new(Arc::clone(&store), engine);
        let changes = ChangeLog::new(Arc::clone(&store), registry.clone());
        let selections = SelectionStore::new(store, registry.clone());
        Self {
            registry,
            presence,
            colors,
            sync,
            changes,
            selections,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn colors(&self) -> &ColorAllocator {
        &self.colors
    }

    pub fn sync(&self) -> &SyncEngine<D> {
        &self.sync
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    pub fn selections(&self) -> &SelectionStore {
        &self.selections
    }

    /// Runs one action for `user` and wraps the outcome in the response
    /// envelope. Failures are request-scoped; nothing is retried.
    pub fn dispatch(&self, user: &UserId, request: &Value) -> Response {
        match self.run(user, request) {
            Ok(data) => Response::success(data),
            Err(err) => Response::error(err.to_string()),
        }
    }

    fn run(&self, user: &UserId, request: &Value) -> Result<Option<Value>, CollabError> {
        let action = request
            .get("action")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(CollabError::MissingField("action"))?;

        match action {
            "registerToFile" => {
                self.registry.register(&doc_field(request)?, user)?;
                Ok(None)
            }
            "unregisterFromFile" => {
                self.registry.unregister(&doc_field(request)?, user)?;
                Ok(None)
            }
            "unregisterFromAllFiles" => {
                self.registry.unregister_all(user);
                Ok(None)
            }
            "removeSelectionAndChangesForAllFiles" => {
                self.selections.remove_all_for_user(user);
                self.changes.remove_all_for_user(user);
                self.sync.remove_all_shadows_for_user(user);
                Ok(None)
            }
            "removeServerTextForAllFiles" => {
                self.sync.remove_all_server_texts();
                Ok(None)
            }
            "sendSelectionChange" => {
                let doc = doc_field(request)?;
                let selection = required_value(request, "selection")?;
                self.selections.set(&doc, user, selection)?;
                Ok(None)
            }
            "sendDocumentChange" => {
                let doc = doc_field(request)?;
                let change = required_value(request, "change")?;
                let revision = request
                    .get("revision")
                    .ok_or(CollabError::MissingField("revision"))?;
                // The client's own revision counter rides inside the
                // payload; the log assigns the server-side revision.
                let mut payload = change.clone();
                match payload.as_object_mut() {
                    Some(obj) => {
                        obj.insert("revision".to_string(), revision.clone());
                    }
                    None => return Err(CollabError::InvalidField("change")),
                }
                self.changes.append(&doc, user, payload)?;
                Ok(None)
            }
            "getUsersAndSelectionsForFile" => {
                let doc = doc_field(request)?;
                let mut out = Map::new();
                for other in self.registry.list_users(&doc) {
                    if other == *user {
                        continue;
                    }
                    if let Some(selection) = self.selections.get(&doc, &other)? {
                        let color = self.colors.color_for(&other)?;
                        out.insert(
                            other.as_str().to_string(),
                            json!({ "selection": selection, "color": color }),
                        );
                    }
                }
                Ok(Some(Value::Object(out)))
            }
            "getUsersAndChangesForFile" => {
                let doc = doc_field(request)?;
                let from = revision_field(request, "fromRevision")?;
                let mut out = Map::new();
                for other in self.registry.list_users(&doc) {
                    if other == *user {
                        continue;
                    }
                    let records = self.changes.since(&doc, &other, from)?;
                    if !records.is_empty() {
                        out.insert(other.as_str().to_string(), serde_json::to_value(records)?);
                    }
                }
                Ok(Some(Value::Object(out)))
            }
            "sendShadow" => {
                let doc = doc_field(request)?;
                let shadow = present_str(request, "shadow")?;
                self.sync.send_shadow(&doc, user, shadow)?;
                Ok(None)
            }
            "synchronizeText" => {
                let doc = doc_field(request)?;
                let patch = present_str(request, "patch")?;
                let back = self.sync.synchronize(&doc, user, patch)?;
                Ok(Some(Value::String(back)))
            }
            "sendHeartbeat" => {
                self.presence.heartbeat(user);
                Ok(None)
            }
            other => Err(CollabError::UnknownAction(other.to_string())),
        }
    }
}

/// Required non-empty `filename`, sanitized into a document id.
fn doc_field(request: &Value) -> Result<DocId, CollabError> {
    let filename = request
        .get("filename")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(CollabError::MissingField("filename"))?;
    Ok(DocId::from_filename(filename)?)
}

/// Required field that must be present and non-empty: null, `""`,
/// `{}`, and `[]` are all rejected before anything touches storage.
fn required_value<'a>(request: &'a Value, field: &'static str) -> Result<&'a Value, CollabError> {
    let value = request.get(field).ok_or(CollabError::MissingField(field))?;
    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        return Err(CollabError::MissingField(field));
    }
    Ok(value)
}

/// Required string field; the empty string is allowed (an empty shadow
/// or patch is meaningful).
fn present_str<'a>(request: &'a Value, field: &'static str) -> Result<&'a str, CollabError> {
    request
        .get(field)
        .and_then(Value::as_str)
        .ok_or(CollabError::MissingField(field))
}

/// Revision number, accepted as a JSON number or a numeric string.
/// Absent fields are missing; present but unparseable ones are invalid.
fn revision_field(request: &Value, field: &'static str) -> Result<u64, CollabError> {
    let value = request.get(field).ok_or(CollabError::MissingField(field))?;
    match value {
        Value::Number(n) => n.as_u64().ok_or(CollabError::InvalidField(field)),
        Value::String(s) => s.parse().map_err(|_| CollabError::InvalidField(field)),
        _ => Err(CollabError::InvalidField(field)),
    }
}
