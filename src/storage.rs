mod directory;
mod document;
mod memory;
mod store;
mod subscribers;

pub use directory::DirectoryStore;
pub use document::{CollectionPath, Document, DocumentId, Fields, InvalidPathError, Snapshot};
pub use memory::InMemoryStore;
pub use store::{DocumentStore, Listener, StoreError, Subscription};
