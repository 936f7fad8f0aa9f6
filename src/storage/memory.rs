//! A mutex-guarded in-memory [`DocumentStore`].
//!
//! Batches are validated and applied under a single lock, so they are truly
//! atomic. This is the store used by tests and by embedders that do not need
//! persistence.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard},
};

use crate::storage::{
    CollectionPath, Document, DocumentId, DocumentStore, Fields, Listener, Snapshot, StoreError,
    Subscription, subscribers::Subscribers,
};

#[derive(Debug, Default)]
struct Collection {
    /// Documents keyed by insertion sequence.
    documents: BTreeMap<u64, Document>,
    /// Lookup from id to insertion sequence.
    index: HashMap<DocumentId, u64>,
    next_seq: u64,
}

impl Collection {
    fn snapshot(&self, version: u64) -> Snapshot {
        Snapshot {
            version,
            documents: self.documents.values().cloned().collect(),
        }
    }

    fn insert(&mut self, document: Document) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(document.id.clone(), seq);
        self.documents.insert(seq, document);
    }

    fn get_mut(&mut self, id: &DocumentId) -> Option<&mut Document> {
        let seq = self.index.get(id)?;
        self.documents.get_mut(seq)
    }

    fn remove(&mut self, id: &DocumentId) -> bool {
        self.index
            .remove(id)
            .and_then(|seq| self.documents.remove(&seq))
            .is_some()
    }
}

#[derive(Debug, Default)]
struct State {
    version: u64,
    collections: HashMap<CollectionPath, Collection>,
}

impl State {
    fn snapshot(&self, collection: &CollectionPath) -> Snapshot {
        self.collections
            .get(collection)
            .map_or_else(
                || Snapshot {
                    version: self.version,
                    documents: Vec::new(),
                },
                |c| c.snapshot(self.version),
            )
    }
}

/// An in-memory document store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    subscribers: Subscribers,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Poisoned(operation))
    }

    /// Number of active listeners on `collection`.
    #[must_use]
    pub fn listener_count(&self, collection: &CollectionPath) -> usize {
        self.subscribers.count(collection)
    }
}

impl DocumentStore for InMemoryStore {
    fn insert(&self, collection: &CollectionPath, fields: Fields) -> Result<DocumentId, StoreError> {
        let id = DocumentId::generate();
        let pending = {
            let mut state = self.lock("insert")?;
            state.version += 1;
            state
                .collections
                .entry(collection.clone())
                .or_default()
                .insert(Document::new(id.clone(), fields));
            self.subscribers
                .notify(collection, state.snapshot(collection))
        };
        tracing::debug!(%collection, %id, "inserted document");
        pending.deliver();
        Ok(id)
    }

    fn query_once(&self, collection: &CollectionPath) -> Result<Snapshot, StoreError> {
        Ok(self.lock("query")?.snapshot(collection))
    }

    fn batched_update(
        &self,
        collection: &CollectionPath,
        patches: Vec<(DocumentId, Fields)>,
    ) -> Result<(), StoreError> {
        let pending = {
            let mut state = self.lock("batched update")?;
            let Some(docs) = state.collections.get_mut(collection) else {
                return match patches.into_iter().next() {
                    Some((id, _)) => Err(StoreError::NotFound { id }),
                    None => Ok(()),
                };
            };
            if let Some((missing, _)) = patches.iter().find(|(id, _)| !docs.index.contains_key(id))
            {
                return Err(StoreError::NotFound {
                    id: missing.clone(),
                });
            }
            for (id, patch) in &patches {
                if let Some(document) = docs.get_mut(id) {
                    document.apply(patch);
                }
            }
            state.version += 1;
            self.subscribers
                .notify(collection, state.snapshot(collection))
        };
        tracing::debug!(%collection, count = patches.len(), "applied batched update");
        pending.deliver();
        Ok(())
    }

    fn batched_delete(
        &self,
        collection: &CollectionPath,
        ids: Vec<DocumentId>,
    ) -> Result<(), StoreError> {
        let (pending, removed) = {
            let mut state = self.lock("batched delete")?;
            let removed = state
                .collections
                .get_mut(collection)
                .map_or(0, |docs| ids.iter().filter(|id| docs.remove(id)).count());
            state.version += 1;
            (
                self.subscribers
                    .notify(collection, state.snapshot(collection)),
                removed,
            )
        };
        tracing::debug!(%collection, requested = ids.len(), removed, "applied batched delete");
        pending.deliver();
        Ok(())
    }

    fn subscribe(
        &self,
        collection: &CollectionPath,
        listener: Listener,
    ) -> Result<Subscription, StoreError> {
        let (initial, subscription) = {
            let state = self.lock("subscribe")?;
            self.subscribers
                .register(collection, listener, state.snapshot(collection))?
        };
        initial.deliver();
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    fn path() -> CollectionPath {
        CollectionPath::new("artifacts/test/public/data/requests").unwrap()
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn query_preserves_insertion_order() {
        let store = InMemoryStore::new();
        let a = store.insert(&path(), fields(json!({"n": 1}))).unwrap();
        let b = store.insert(&path(), fields(json!({"n": 2}))).unwrap();
        let c = store.insert(&path(), fields(json!({"n": 3}))).unwrap();

        let ids: Vec<_> = store
            .query_once(&path())
            .unwrap()
            .documents
            .into_iter()
            .map(|d| d.id)
            .collect();

        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn unknown_collection_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.query_once(&path()).unwrap().is_empty());
    }

    #[test]
    fn batched_update_with_missing_id_writes_nothing() {
        let store = InMemoryStore::new();
        let a = store
            .insert(&path(), fields(json!({"actionTaken": false})))
            .unwrap();
        let before = store.query_once(&path()).unwrap();

        let result = store.batched_update(
            &path(),
            vec![
                (a, fields(json!({"actionTaken": true}))),
                (DocumentId::from("missing"), fields(json!({"actionTaken": true}))),
            ],
        );

        assert!(matches!(result, Err(StoreError::NotFound { id }) if id.as_str() == "missing"));
        assert_eq!(
            store.query_once(&path()).unwrap().documents,
            before.documents
        );
    }

    #[test]
    fn batched_delete_removes_only_listed_ids() {
        let store = InMemoryStore::new();
        let ids: Vec<_> = (0..5)
            .map(|n| store.insert(&path(), fields(json!({"n": n}))).unwrap())
            .collect();

        store
            .batched_delete(&path(), vec![ids[0].clone(), ids[2].clone(), ids[4].clone()])
            .unwrap();

        let remaining: Vec<_> = store
            .query_once(&path())
            .unwrap()
            .documents
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(remaining, vec![ids[1].clone(), ids[3].clone()]);
    }

    #[test]
    fn deleting_missing_document_is_a_no_op() {
        let store = InMemoryStore::new();
        store.delete(&path(), &DocumentId::from("nope")).unwrap();
    }

    #[test]
    fn subscribers_see_initial_and_subsequent_snapshots() {
        let store = InMemoryStore::new();
        store.insert(&path(), fields(json!({"n": 0}))).unwrap();

        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let subscription = store
            .subscribe(
                &path(),
                Box::new(move |snapshot: &Snapshot| sink.lock().unwrap().push(snapshot.len())),
            )
            .unwrap();

        let id = store.insert(&path(), fields(json!({"n": 1}))).unwrap();
        store.delete(&path(), &id).unwrap();
        subscription.cancel();
        store.insert(&path(), fields(json!({"n": 2}))).unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![1, 2, 1]);
        assert_eq!(store.listener_count(&path()), 0);
    }

    #[test]
    fn other_collections_do_not_notify() {
        let store = InMemoryStore::new();
        let calls = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&calls);
        let _subscription = store
            .subscribe(&path(), Box::new(move |_: &Snapshot| *sink.lock().unwrap() += 1))
            .unwrap();

        let other = CollectionPath::new("artifacts/test/public/data/movies").unwrap();
        store.insert(&other, fields(json!({"title": "Dune"}))).unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn listeners_may_read_the_store() {
        let store = Arc::new(InMemoryStore::new());
        let reader = Arc::clone(&store);
        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        let _subscription = store
            .subscribe(
                &path(),
                Box::new(move |_: &Snapshot| {
                    let len = reader.query_once(&path()).unwrap().len();
                    sink.lock().unwrap().push(len);
                }),
            )
            .unwrap();

        store.insert(&path(), fields(json!({"n": 1}))).unwrap();

        assert_eq!(*observed.lock().unwrap(), vec![0, 1]);
    }
}
