//! The document store abstraction shared by every backend.

use std::{fmt, io};

use crate::storage::{CollectionPath, DocumentId, Fields, InvalidPathError, Snapshot};

/// A callback receiving full collection snapshots.
pub type Listener = Box<dyn Fn(&Snapshot) + Send + Sync>;

/// A document database holding named collections of loosely typed documents.
///
/// Batched operations are all-or-nothing: after an error the collection is in
/// the state it was in before the call, unless the error is
/// [`StoreError::PartialFailure`].
pub trait DocumentStore: Send + Sync {
    /// Insert a new document, returning its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be persisted.
    fn insert(&self, collection: &CollectionPath, fields: Fields) -> Result<DocumentId, StoreError>;

    /// Read the current content of a collection once.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    fn query_once(&self, collection: &CollectionPath) -> Result<Snapshot, StoreError>;

    /// Merge `patch` into a single document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such document exists.
    fn update(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        patch: Fields,
    ) -> Result<(), StoreError> {
        self.batched_update(collection, vec![(id.clone(), patch)])
    }

    /// Delete a single document. Deleting a missing document succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion cannot be persisted.
    fn delete(&self, collection: &CollectionPath, id: &DocumentId) -> Result<(), StoreError> {
        self.batched_delete(collection, vec![id.clone()])
    }

    /// Apply several patches as one atomic write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] without writing anything if any id is
    /// missing.
    fn batched_update(
        &self,
        collection: &CollectionPath,
        patches: Vec<(DocumentId, Fields)>,
    ) -> Result<(), StoreError>;

    /// Delete several documents as one atomic write. Missing ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion cannot be persisted.
    fn batched_delete(
        &self,
        collection: &CollectionPath,
        ids: Vec<DocumentId>,
    ) -> Result<(), StoreError>;

    /// Register `listener` for snapshots of `collection`.
    ///
    /// The listener is called once with the current snapshot and again after
    /// every mutation of the collection, until the returned [`Subscription`]
    /// is cancelled or dropped. Deliveries to one listener never overlap and
    /// never go back to an older version, so a listener must not mutate the
    /// collection it watches from inside the callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial snapshot cannot be read.
    fn subscribe(
        &self,
        collection: &CollectionPath,
        listener: Listener,
    ) -> Result<Subscription, StoreError>;
}

/// Handle to a live subscription. Dropping it unsubscribes.
#[must_use = "dropping a subscription cancels it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a cancellation callback.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving snapshots.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Errors reported by a [`DocumentStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced document does not exist.
    #[error("document {id} not found")]
    NotFound {
        /// The missing document.
        id: DocumentId,
    },
    /// A collection path could not be used.
    #[error(transparent)]
    InvalidPath(#[from] InvalidPathError),
    /// The backing storage failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    /// A document could not be encoded or decoded.
    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_yaml::Error),
    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned during {0}")]
    Poisoned(&'static str),
    /// A batch failed part-way and could not be rolled back.
    ///
    /// The listed documents hold the new values; the rest of the batch does
    /// not.
    #[error("batch partially applied ({} documents modified): {cause}", applied.len())]
    PartialFailure {
        /// Documents left modified.
        applied: Vec<DocumentId>,
        /// The failure that interrupted the batch.
        cause: Box<StoreError>,
    },
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::Subscription;

    #[test]
    fn cancel_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        {
            let _subscription = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
