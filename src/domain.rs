//! Domain models for the catalog and its request board.
//!
//! This module contains the core domain types: titles, request records and
//! their aggregation, catalog entries, sessions and configuration. Nothing in
//! here talks to a store.

mod access;
pub use access::{AccessError, Role, Session};

/// Aggregation of request records into per-title groups.
pub mod aggregate;
pub use aggregate::{Aggregation, RequestGroup, group_requests};

/// Catalog entry model and seed data.
pub mod catalog;
pub use catalog::CatalogEntry;

mod config;
pub use config::Config;

/// Visitor request records.
pub mod request;
pub use request::{IntegrityError, NewRequest, RequestRecord, VisitorId};

mod title;
pub use title::{InvalidTitleError, Title};
