use std::{fmt, sync::Arc};

use crate::{
    domain::Config,
    service::{Catalog, Requests},
    storage::{CollectionPath, DocumentStore, InMemoryStore, InvalidPathError},
};

/// Everything a service needs to reach the store.
///
/// Constructed once by the caller and passed to each service, so tests can
/// run against an [`InMemoryStore`] side by side.
#[derive(Clone)]
pub struct Context {
    store: Arc<dyn DocumentStore>,
    config: Config,
    requests: CollectionPath,
    catalog: CollectionPath,
}

impl Context {
    /// Bind a store to a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured application id does not form valid
    /// collection paths.
    pub fn new(store: Arc<dyn DocumentStore>, config: Config) -> Result<Self, InvalidPathError> {
        let requests = config.requests_collection()?;
        let catalog = config.catalog_collection()?;
        Ok(Self {
            store,
            config,
            requests,
            catalog,
        })
    }

    /// A context over a fresh in-memory store with the default
    /// configuration.
    ///
    /// # Panics
    ///
    /// Panics if the default application id stops being a valid path
    /// segment, which should never happen.
    #[must_use]
    pub fn in_memory() -> Self {
        let config = Config::default();
        Self {
            store: Arc::new(InMemoryStore::new()),
            requests: config
                .requests_collection()
                .expect("default app id is a valid path segment"),
            catalog: config
                .catalog_collection()
                .expect("default app id is a valid path segment"),
            config,
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The collection holding visitor requests.
    #[must_use]
    pub const fn requests_collection(&self) -> &CollectionPath {
        &self.requests
    }

    /// The collection holding catalog entries.
    #[must_use]
    pub const fn catalog_collection(&self) -> &CollectionPath {
        &self.catalog
    }

    /// Request submission, the live request board and request actions.
    #[must_use]
    pub const fn requests(&self) -> Requests<'_> {
        Requests::new(self)
    }

    /// Catalog browsing and management.
    #[must_use]
    pub const fn catalog(&self) -> Catalog<'_> {
        Catalog::new(self)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("requests", &self.requests)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
