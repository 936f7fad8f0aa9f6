//! Application services over a [`DocumentStore`](crate::storage::DocumentStore).
//!
//! A [`Context`] binds a store to a configuration and hands out short-lived
//! service handles that enforce access control and keep the typed domain
//! models in step with the stored documents.

mod catalog;
mod context;
mod requests;

pub use catalog::{Catalog, CatalogError};
pub use context::Context;
pub use requests::{ActionError, RequestBoard, Requests};
