//! Typed composite keys.
//!
//! A key names one piece of collaborative state by document, user, and
//! kind. Variant order doubles as the global lock order: `ServerText`
//! sorts before `Shadow`, and every multi-key lock sequence must acquire
//! in ascending `Key` order.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("unsafe path segment: {0}")]
    UnsafePath(String),
    #[error("empty identifier")]
    Empty,
}

/// Sanitized document identifier derived from a client-supplied filename.
///
/// Path separators are replaced with `_`; anything still containing a
/// parent-directory sequence afterwards is rejected outright.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(String);

impl DocId {
    pub fn from_filename(filename: &str) -> Result<Self, KeyError> {
        if filename.is_empty() {
            return Err(KeyError::Empty);
        }
        let sanitized: String = filename
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        if sanitized.contains("..") {
            return Err(KeyError::UnsafePath(filename.to_string()));
        }
        Ok(DocId(sanitized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated user identifier. Unlike filenames, user names are never
/// rewritten: a separator or `..` is a hard failure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(user: &str) -> Result<Self, KeyError> {
        if user.is_empty() {
            return Err(KeyError::Empty);
        }
        if user.contains('/') || user.contains('\\') || user.contains("..") {
            return Err(KeyError::UnsafePath(user.to_string()));
        }
        Ok(UserId(user.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// Canonical text of a document, shared by all collaborators.
    ServerText { doc: DocId },
    /// Last text state known common to one user's client and the server.
    Shadow { doc: DocId, user: UserId },
    /// Subscription marker; existence means the pair is registered.
    Registration { doc: DocId, user: UserId },
    /// Revision-numbered change log for one (document, user) writer.
    Changes { doc: DocId, user: UserId },
    /// Latest cursor/selection payload for one (document, user).
    Selection { doc: DocId, user: UserId },
    /// Last heartbeat instant for a user, in seconds.
    Heartbeat { user: UserId },
    /// Display color assigned to a user.
    Color { user: UserId },
}

impl Key {
    pub fn doc(&self) -> Option<&DocId> {
        match self {
            Key::ServerText { doc }
            | Key::Shadow { doc, .. }
            | Key::Registration { doc, .. }
            | Key::Changes { doc, .. }
            | Key::Selection { doc, .. } => Some(doc),
            Key::Heartbeat { .. } | Key::Color { .. } => None,
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        match self {
            Key::ServerText { .. } => None,
            Key::Shadow { user, .. }
            | Key::Registration { user, .. }
            | Key::Changes { user, .. }
            | Key::Selection { user, .. }
            | Key::Heartbeat { user }
            | Key::Color { user } => Some(user),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::ServerText { doc } => write!(f, "text:{doc}"),
            Key::Shadow { doc, user } => write!(f, "shadow:{doc}:{user}"),
            Key::Registration { doc, user } => write!(f, "registered:{doc}:{user}"),
            Key::Changes { doc, user } => write!(f, "changes:{doc}:{user}"),
            Key::Selection { doc, user } => write!(f, "selection:{doc}:{user}"),
            Key::Heartbeat { user } => write!(f, "heartbeat:{user}"),
            Key::Color { user } => write!(f, "color:{user}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_sanitize_matrix() {
        assert_eq!(
            DocId::from_filename("/test/test.js").unwrap().as_str(),
            "_test_test.js"
        );
        assert_eq!(DocId::from_filename("a\\b.txt").unwrap().as_str(), "a_b.txt");
        assert_eq!(DocId::from_filename("plain.txt").unwrap().as_str(), "plain.txt");
        assert_eq!(
            DocId::from_filename("../etc/passwd"),
            Err(KeyError::UnsafePath("../etc/passwd".to_string()))
        );
        assert_eq!(DocId::from_filename(""), Err(KeyError::Empty));
    }

    #[test]
    fn user_id_rejects_separators() {
        assert!(UserId::new("alice").is_ok());
        assert_eq!(
            UserId::new("a/b"),
            Err(KeyError::UnsafePath("a/b".to_string()))
        );
        assert_eq!(
            UserId::new(".."),
            Err(KeyError::UnsafePath("..".to_string()))
        );
    }

    #[test]
    fn server_text_orders_before_shadow() {
        let doc = DocId::from_filename("a.txt").unwrap();
        let user = UserId::new("alice").unwrap();
        let text = Key::ServerText { doc: doc.clone() };
        let shadow = Key::Shadow { doc, user };
        assert!(text < shadow);
    }
}
