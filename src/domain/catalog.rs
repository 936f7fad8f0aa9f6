use serde_json::Value;

use crate::{
    domain::Title,
    storage::{Document, DocumentId, Fields},
};

/// Document field names of a catalog entry.
pub mod field {
    /// The entry's title.
    pub const TITLE: &str = "title";
    /// Poster image location.
    pub const POSTER_URL: &str = "posterUrl";
}

/// A movie or series in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Store-assigned identifier.
    pub id: DocumentId,
    /// Display title; also the title visitors request.
    pub title: Title,
    /// Poster image location. Not validated as a URL.
    pub poster_url: String,
}

impl CatalogEntry {
    /// Read a stored document as a catalog entry.
    ///
    /// A missing poster URL reads as an empty string. Returns `None` if the
    /// title is missing or empty.
    #[must_use]
    pub fn from_document(document: &Document) -> Option<Self> {
        let title = document
            .get(field::TITLE)
            .and_then(Value::as_str)
            .and_then(|s| Title::try_from(s).ok())?;
        let poster_url = document
            .get(field::POSTER_URL)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self {
            id: document.id.clone(),
            title,
            poster_url,
        })
    }

    /// Whether the title contains `term`, ignoring case.
    ///
    /// An empty term matches everything.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        self.title.to_lowercase().contains(&term.to_lowercase())
    }
}

/// Fields for a new or edited catalog entry.
#[must_use]
pub fn entry_fields(title: &Title, poster_url: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert(field::TITLE.to_string(), Value::String(title.to_string()));
    fields.insert(
        field::POSTER_URL.to_string(),
        Value::String(poster_url.to_string()),
    );
    fields
}

/// Placeholder poster location for a title.
#[must_use]
pub fn placeholder_poster(title: &str) -> String {
    format!(
        "https://placehold.co/400x600/0f172a/ffffff?text={}",
        title.replace(' ', "+")
    )
}

/// The titles a fresh catalog is seeded with.
pub const DEFAULT_TITLES: [&str; 6] = [
    "Inception",
    "The Matrix",
    "Interstellar",
    "Parasite",
    "The Dark Knight",
    "Stranger Things",
];

/// Fields of every seed entry, in catalog order.
#[must_use]
pub fn default_catalog() -> Vec<Fields> {
    DEFAULT_TITLES
        .iter()
        .filter_map(|title| Title::try_from(*title).ok())
        .map(|title| entry_fields(&title, &placeholder_poster(&title)))
        .collect()
}
