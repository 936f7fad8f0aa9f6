use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::Title,
    storage::{Document, DocumentId, Fields},
};

/// Document field names of a request record.
pub mod field {
    /// The requested title.
    pub const MOVIE_TITLE: &str = "movieTitle";
    /// RFC 3339 creation timestamp.
    pub const REQUESTED_AT: &str = "requestedAt";
    /// The requesting visitor.
    pub const REQUESTED_BY: &str = "requestedBy";
    /// Whether an administrator has dealt with the request.
    pub const ACTION_TAKEN: &str = "actionTaken";
}

/// Opaque identifier of a visitor session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisitorId(String);

impl VisitorId {
    /// Wrap an existing identifier.
    ///
    /// Returns `None` if the identifier is empty.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        (!id.is_empty()).then_some(Self(id))
    }

    /// The requester attributed to records that do not name one.
    #[must_use]
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// Generate a fresh anonymous identifier.
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

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single visitor's request for a title to be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// Store-assigned identifier.
    pub id: DocumentId,
    /// The requested title; the grouping key.
    pub movie_title: Title,
    /// When the request was made.
    pub requested_at: DateTime<Utc>,
    /// Who made the request.
    pub requested_by: VisitorId,
    /// Whether an administrator has actioned the request.
    pub action_taken: bool,
}

impl RequestRecord {
    /// Validate a stored document as a request record.
    ///
    /// A missing or non-boolean `actionTaken` is read as `false`, and a
    /// missing or empty `requestedBy` as [`VisitorId::unknown`].
    ///
    /// # Errors
    ///
    /// Returns an [`IntegrityError`] if the title is missing or empty or the
    /// timestamp is missing or not RFC 3339.
    pub fn from_document(document: &Document) -> Result<Self, IntegrityError> {
        let fail = |problem| IntegrityError {
            id: document.id.clone(),
            problem,
        };

        let movie_title = document
            .get(field::MOVIE_TITLE)
            .and_then(Value::as_str)
            .and_then(|s| Title::try_from(s).ok())
            .ok_or_else(|| fail(Problem::Title))?;

        let requested_at = match document.get(field::REQUESTED_AT) {
            None | Some(Value::Null) => return Err(fail(Problem::MissingTimestamp)),
            Some(value) => value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .ok_or_else(|| fail(Problem::InvalidTimestamp(value.to_string())))?,
        };

        let requested_by = document
            .get(field::REQUESTED_BY)
            .and_then(Value::as_str)
            .and_then(VisitorId::new)
            .unwrap_or_else(VisitorId::unknown);

        let action_taken = document
            .get(field::ACTION_TAKEN)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            id: document.id.clone(),
            movie_title,
            requested_at,
            requested_by,
            action_taken,
        })
    }
}

/// The fields of a request that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    /// The requested title.
    pub movie_title: Title,
    /// Who is asking.
    pub requested_by: VisitorId,
    /// Creation time.
    pub requested_at: DateTime<Utc>,
}

impl NewRequest {
    /// A request for `movie_title` made now by `requested_by`.
    #[must_use]
    pub fn now(movie_title: Title, requested_by: VisitorId) -> Self {
        Self {
            movie_title,
            requested_by,
            requested_at: Utc::now(),
        }
    }

    /// The document body to insert. `actionTaken` starts out `false`.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            field::MOVIE_TITLE.to_string(),
            Value::String(self.movie_title.to_string()),
        );
        fields.insert(
            field::REQUESTED_AT.to_string(),
            Value::String(self.requested_at.to_rfc3339()),
        );
        fields.insert(
            field::REQUESTED_BY.to_string(),
            Value::String(self.requested_by.to_string()),
        );
        fields.insert(field::ACTION_TAKEN.to_string(), Value::Bool(false));
        fields
    }
}

/// The patch that sets `actionTaken` on a request.
#[must_use]
pub fn action_patch(action_taken: bool) -> Fields {
    let mut fields = Fields::new();
    fields.insert(field::ACTION_TAKEN.to_string(), Value::Bool(action_taken));
    fields
}

/// A stored request that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request {id} is malformed: {problem}")]
pub struct IntegrityError {
    /// The offending document.
    pub id: DocumentId,
    /// What is wrong with it.
    pub problem: Problem,
}

/// The shape violation behind an [`IntegrityError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Problem {
    /// `movieTitle` is missing, not a string, or empty.
    #[error("missing or empty title")]
    Title,
    /// `requestedAt` is absent.
    #[error("missing timestamp")]
    MissingTimestamp,
    /// `requestedAt` is not an RFC 3339 timestamp.
    #[error("unparseable timestamp {0}")]
    InvalidTimestamp(String),
}
