//! Community Movie Catalog
//!
//! Visitors browse a catalog of titles and request the ones they would like
//! added. Administrators see those requests grouped per title, ordered by
//! recency, and act on a whole group at once.

pub mod domain;
pub use domain::{
    AccessError, Aggregation, CatalogEntry, Config, RequestGroup, RequestRecord, Session, Title,
    VisitorId,
};

/// Document storage backends.
pub mod storage;
pub use storage::{DirectoryStore, DocumentStore, InMemoryStore, StoreError};

pub mod service;
pub use service::{ActionError, CatalogError, Context, RequestBoard};
