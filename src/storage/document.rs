//! Loosely typed documents, their identifiers and the collections that hold
//! them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The body of a document: a JSON object of named fields.
///
/// Documents are not schema-checked by the store. Typed views
/// ([`RequestRecord`](crate::RequestRecord),
/// [`CatalogEntry`](crate::CatalogEntry)) validate the shape when reading.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// An opaque, store-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The document's identifier.
    pub id: DocumentId,
    /// The document's fields.
    pub fields: Fields,
}

impl Document {
    /// Construct a document from its parts.
    #[must_use]
    pub const fn new(id: DocumentId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }

    /// Merge `patch` into this document, overwriting fields with the same
    /// name.
    pub fn apply(&mut self, patch: &Fields) {
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

/// The complete, ordered content of one collection at a point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Store version at which the snapshot was taken. Versions increase with
    /// every mutation.
    pub version: u64,
    /// Documents in insertion order.
    pub documents: Vec<Document>,
}

impl Snapshot {
    /// Whether the collection holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of documents in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

/// A validated, slash separated collection path such as
/// `artifacts/default-movie-app/public/data/requests`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Validate and construct a collection path.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPathError`] if the path is empty, has empty segments,
    /// contains `.` or `..` segments, or uses characters other than ASCII
    /// alphanumerics, `-`, `_` and `.`.
    pub fn new(path: impl Into<String>) -> Result<Self, InvalidPathError> {
        let path = path.into();
        if path.is_empty() {
            return Err(InvalidPathError::new(path));
        }
        let valid = path.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });
        if valid {
            Ok(Self(path))
        } else {
            Err(InvalidPathError::new(path))
        }
    }

    /// The path segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionPath {
    type Err = InvalidPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error returned for a malformed collection path.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid collection path '{0}'")]
pub struct InvalidPathError(String);

impl InvalidPathError {
    pub(crate) const fn new(path: String) -> Self {
        Self(path)
    }
}
