//! A filesystem backed document store
//!
//! Each collection is a directory below the store root and each document is a
//! small YAML file named after its id. Writes go through a temporary file and
//! a rename, and batches undo their own writes when one of them fails.

use std::{
    ffi::OsStr,
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::storage::{
    CollectionPath, Document, DocumentId, DocumentStore, Fields, Listener, Snapshot, StoreError,
    Subscription, subscribers::Subscribers,
};

const EXTENSION: &str = "yaml";

/// A document store persisted as files under a root directory.
pub struct DirectoryStore {
    /// The root directory collections are stored in.
    root: PathBuf,
    /// Serialises writers within this process; holds the store version.
    version: Mutex<u64>,
    subscribers: Subscribers,
}

/// A document as loaded from disk, with its ordering key.
#[derive(Debug, Clone)]
struct Stored {
    seq: u64,
    document: Document,
}

/// The serialized versions of a stored document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 { seq: u64, fields: Fields },
}

impl DirectoryStore {
    /// Opens a store rooted at the given path.
    ///
    /// Directories are created on first write.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            version: Mutex::new(0),
            subscribers: Subscribers::default(),
        }
    }

    /// The root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, u64>, StoreError> {
        self.version
            .lock()
            .map_err(|_| StoreError::Poisoned(operation))
    }

    fn collection_dir(&self, collection: &CollectionPath) -> PathBuf {
        collection
            .segments()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn load(&self, collection: &CollectionPath) -> Vec<Stored> {
        let dir = self.collection_dir(collection);
        if !dir.is_dir() {
            return Vec::new();
        }

        let paths = collect_document_paths(&dir);
        let (loaded, skipped): (Vec<_>, Vec<_>) = paths
            .par_iter()
            .map(|path| try_load_document(path))
            .partition(Result::is_ok);

        for path in skipped.into_iter().filter_map(Result::err) {
            tracing::warn!("Skipping unreadable document at {}", path.display());
        }

        let mut documents: Vec<Stored> = loaded.into_iter().filter_map(Result::ok).collect();
        documents.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.document.id.cmp(&b.document.id)));
        documents
    }

    fn document_path(dir: &Path, id: &DocumentId) -> PathBuf {
        dir.join(format!("{id}.{EXTENSION}"))
    }

    fn write(dir: &Path, stored: &Stored) -> Result<(), StoreError> {
        fs::create_dir_all(dir)?;
        let target = Self::document_path(dir, &stored.document.id);
        let staging = dir.join(format!(".{}.tmp", stored.document.id));

        let record = Versions::V1 {
            seq: stored.seq,
            fields: stored.document.fields.clone(),
        };
        let content = serde_yaml::to_string(&record)?;

        let file = fs::File::create(&staging)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        drop(writer);

        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn remove(dir: &Path, id: &DocumentId) -> Result<(), StoreError> {
        match fs::remove_file(Self::document_path(dir, id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every document in `ids` that is present in `documents`, undoing
    /// the removals if one fails. Returns the number removed.
    fn remove_all(
        dir: &Path,
        documents: &mut Vec<Stored>,
        ids: &[DocumentId],
    ) -> Result<usize, StoreError> {
        let mut backups = Vec::new();
        for id in ids {
            let Some(position) = documents.iter().position(|s| &s.document.id == id) else {
                continue;
            };
            if let Err(e) = Self::remove(dir, id) {
                return Err(Self::roll_back(dir, &backups, e));
            }
            backups.push(documents.remove(position));
        }
        Ok(backups.len())
    }

    /// Restore `backups` after a failed batch.
    ///
    /// Returns the original error if every backup was restored, or a
    /// [`StoreError::PartialFailure`] naming the documents that could not be.
    fn roll_back(dir: &Path, backups: &[Stored], cause: StoreError) -> StoreError {
        let stuck: Vec<DocumentId> = backups
            .iter()
            .rev()
            .filter_map(|backup| {
                Self::write(dir, backup).err().map(|e| {
                    tracing::error!(
                        "Failed to restore document {}: {e}",
                        backup.document.id
                    );
                    backup.document.id.clone()
                })
            })
            .collect();

        if stuck.is_empty() {
            tracing::warn!("Rolled back {} documents after failed batch", backups.len());
            cause
        } else {
            StoreError::PartialFailure {
                applied: stuck,
                cause: Box::new(cause),
            }
        }
    }

    fn snapshot(version: u64, documents: &[Stored]) -> Snapshot {
        Snapshot {
            version,
            documents: documents.iter().map(|s| s.document.clone()).collect(),
        }
    }
}

fn collect_document_paths(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension() == Some(OsStr::new(EXTENSION)))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn try_load_document(path: &Path) -> Result<Stored, PathBuf> {
    let Some(id) = path.file_stem().and_then(OsStr::to_str) else {
        return Err(path.to_path_buf());
    };

    let content = fs::read_to_string(path).map_err(|e| {
        tracing::debug!("Failed to read {}: {e}", path.display());
        path.to_path_buf()
    })?;

    match serde_yaml::from_str::<Versions>(&content) {
        Ok(Versions::V1 { seq, fields }) => Ok(Stored {
            seq,
            document: Document::new(DocumentId::from(id), fields),
        }),
        Err(e) => {
            tracing::debug!("Failed to parse {}: {e}", path.display());
            Err(path.to_path_buf())
        }
    }
}

impl DocumentStore for DirectoryStore {
    fn insert(&self, collection: &CollectionPath, fields: Fields) -> Result<DocumentId, StoreError> {
        let dir = self.collection_dir(collection);
        let id = DocumentId::generate();

        let pending = {
            let mut version = self.lock("insert")?;
            let mut documents = self.load(collection);
            let seq = documents.last().map_or(0, |s| s.seq + 1);
            let stored = Stored {
                seq,
                document: Document::new(id.clone(), fields),
            };
            Self::write(&dir, &stored)?;
            documents.push(stored);
            *version += 1;
            self.subscribers
                .notify(collection, Self::snapshot(*version, &documents))
        };

        tracing::debug!(%collection, %id, "inserted document");
        pending.deliver();
        Ok(id)
    }

    fn query_once(&self, collection: &CollectionPath) -> Result<Snapshot, StoreError> {
        let version = self.lock("query")?;
        Ok(Self::snapshot(*version, &self.load(collection)))
    }

    fn batched_update(
        &self,
        collection: &CollectionPath,
        patches: Vec<(DocumentId, Fields)>,
    ) -> Result<(), StoreError> {
        let dir = self.collection_dir(collection);

        let pending = {
            let mut version = self.lock("batched update")?;
            let mut documents = self.load(collection);

            let mut targets = Vec::with_capacity(patches.len());
            for (id, patch) in &patches {
                let Some(position) = documents.iter().position(|s| &s.document.id == id) else {
                    return Err(StoreError::NotFound { id: id.clone() });
                };
                targets.push((position, patch));
            }

            let mut backups = Vec::with_capacity(targets.len());
            for &(position, patch) in &targets {
                let original = documents[position].clone();
                let mut updated = original.clone();
                updated.document.apply(patch);
                if let Err(e) = Self::write(&dir, &updated) {
                    return Err(Self::roll_back(&dir, &backups, e));
                }
                backups.push(original);
                documents[position] = updated;
            }

            *version += 1;
            self.subscribers
                .notify(collection, Self::snapshot(*version, &documents))
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
        let dir = self.collection_dir(collection);

        let pending = {
            let mut version = self.lock("batched delete")?;
            let mut documents = self.load(collection);

            let removed = Self::remove_all(&dir, &mut documents, &ids)?;

            *version += 1;
            tracing::debug!(%collection, requested = ids.len(), removed, "applied batched delete");
            self.subscribers
                .notify(collection, Self::snapshot(*version, &documents))
        };

        pending.deliver();
        Ok(())
    }

    fn subscribe(
        &self,
        collection: &CollectionPath,
        listener: Listener,
    ) -> Result<Subscription, StoreError> {
        let (initial, subscription) = {
            let version = self.lock("subscribe")?;
            let snapshot = Self::snapshot(*version, &self.load(collection));
            self.subscribers.register(collection, listener, snapshot)?
        };
        initial.deliver();
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn path() -> CollectionPath {
        CollectionPath::new("artifacts/test/public/data/requests").unwrap()
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().unwrap().clone()
    }

    fn setup() -> (TempDir, DirectoryStore) {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let store = DirectoryStore::new(tmp.path().to_path_buf());
        (tmp, store)
    }

    #[test]
    fn documents_persist_across_instances() {
        let (tmp, store) = setup();
        let a = store.insert(&path(), fields(json!({"movieTitle": "Dune"}))).unwrap();
        let b = store
            .insert(&path(), fields(json!({"movieTitle": "Arrival"})))
            .unwrap();

        let reopened = DirectoryStore::new(tmp.path().to_path_buf());
        let snapshot = reopened.query_once(&path()).unwrap();

        let ids: Vec<_> = snapshot.documents.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(
            snapshot.documents[0].get("movieTitle"),
            Some(&json!("Dune"))
        );
    }

    #[test]
    fn documents_are_stored_under_the_collection_path() {
        let (tmp, store) = setup();
        let id = store.insert(&path(), fields(json!({"n": 1}))).unwrap();

        let expected = tmp
            .path()
            .join("artifacts/test/public/data/requests")
            .join(format!("{id}.yaml"));
        assert!(expected.exists());
    }

    #[test]
    fn batched_update_applies_every_patch() {
        let (_tmp, store) = setup();
        let ids: Vec<_> = (0..3)
            .map(|_| {
                store
                    .insert(&path(), fields(json!({"actionTaken": false})))
                    .unwrap()
            })
            .collect();

        store
            .batched_update(
                &path(),
                ids.iter()
                    .map(|id| (id.clone(), fields(json!({"actionTaken": true}))))
                    .collect(),
            )
            .unwrap();

        let snapshot = store.query_once(&path()).unwrap();
        assert!(
            snapshot
                .documents
                .iter()
                .all(|d| d.get("actionTaken") == Some(&json!(true)))
        );
    }

    #[test]
    fn batched_update_with_missing_id_writes_nothing() {
        let (_tmp, store) = setup();
        let a = store
            .insert(&path(), fields(json!({"actionTaken": false})))
            .unwrap();

        let error = store
            .batched_update(
                &path(),
                vec![
                    (a, fields(json!({"actionTaken": true}))),
                    (DocumentId::from("ghost"), fields(json!({"actionTaken": true}))),
                ],
            )
            .unwrap_err();

        assert!(matches!(error, StoreError::NotFound { .. }));
        let snapshot = store.query_once(&path()).unwrap();
        assert_eq!(snapshot.documents[0].get("actionTaken"), Some(&json!(false)));
    }

    #[test]
    fn failed_write_rolls_back_earlier_writes() {
        let (tmp, store) = setup();
        let a = store
            .insert(&path(), fields(json!({"actionTaken": false})))
            .unwrap();
        let b = store
            .insert(&path(), fields(json!({"actionTaken": false})))
            .unwrap();

        // Block the staging file of the second document so its write fails.
        let dir = tmp.path().join("artifacts/test/public/data/requests");
        fs::create_dir(dir.join(format!(".{b}.tmp"))).unwrap();

        let error = store
            .batched_update(
                &path(),
                vec![
                    (a.clone(), fields(json!({"actionTaken": true}))),
                    (b, fields(json!({"actionTaken": true}))),
                ],
            )
            .unwrap_err();

        assert!(matches!(error, StoreError::Io(_)));
        let snapshot = store.query_once(&path()).unwrap();
        assert!(
            snapshot
                .documents
                .iter()
                .all(|d| d.get("actionTaken") == Some(&json!(false)))
        );
    }

    #[test]
    fn batched_delete_removes_files() {
        let (_tmp, store) = setup();
        let a = store.insert(&path(), fields(json!({"n": 1}))).unwrap();
        let b = store.insert(&path(), fields(json!({"n": 2}))).unwrap();
        let c = store.insert(&path(), fields(json!({"n": 3}))).unwrap();

        store
            .batched_delete(&path(), vec![a, c, DocumentId::from("ghost")])
            .unwrap();

        let ids: Vec<_> = store
            .query_once(&path())
            .unwrap()
            .documents
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![b]);
    }

    /// Load `collection` plus a document whose file is a non-empty
    /// directory, so removing it fails.
    fn with_undeletable(tmp: &TempDir, store: &DirectoryStore) -> (PathBuf, Vec<Stored>, DocumentId) {
        let dir = tmp.path().join("artifacts/test/public/data/requests");
        let blocked = DocumentId::from("blocked");
        let blocker = DirectoryStore::document_path(&dir, &blocked);
        fs::create_dir_all(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        let mut documents = store.load(&path());
        documents.push(Stored {
            seq: 99,
            document: Document::new(blocked.clone(), Fields::new()),
        });
        (dir, documents, blocked)
    }

    #[test]
    fn failed_delete_restores_removed_documents() {
        let (tmp, store) = setup();
        let a = store.insert(&path(), fields(json!({"n": 1}))).unwrap();
        let b = store.insert(&path(), fields(json!({"n": 2}))).unwrap();
        let (dir, mut documents, blocked) = with_undeletable(&tmp, &store);

        let error =
            DirectoryStore::remove_all(&dir, &mut documents, &[a.clone(), blocked, b.clone()])
                .unwrap_err();

        assert!(matches!(error, StoreError::Io(_)));
        let snapshot = store.query_once(&path()).unwrap();
        let ids: Vec<_> = snapshot.documents.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(snapshot.documents[0].get("n"), Some(&json!(1)));
    }

    #[test]
    fn unrestorable_documents_are_reported_as_partial() {
        let (tmp, store) = setup();
        let a = store.insert(&path(), fields(json!({"n": 1}))).unwrap();
        let (dir, mut documents, blocked) = with_undeletable(&tmp, &store);
        // Block the staging file used to restore `a`.
        fs::create_dir_all(dir.join(format!(".{a}.tmp")).join("keep")).unwrap();

        let error = DirectoryStore::remove_all(&dir, &mut documents, &[a.clone(), blocked])
            .unwrap_err();

        let StoreError::PartialFailure { applied, cause } = &error else {
            panic!("expected a partial failure, got {error:?}");
        };
        assert_eq!(applied, &vec![a]);
        assert!(matches!(**cause, StoreError::Io(_)));
        assert!(store.query_once(&path()).unwrap().is_empty());
    }

    #[test]
    fn unrestorable_updates_are_reported_as_partial() {
        let (tmp, store) = setup();
        let a = store
            .insert(&path(), fields(json!({"actionTaken": false})))
            .unwrap();
        let dir = tmp.path().join("artifacts/test/public/data/requests");
        let backup = store.load(&path()).remove(0);
        fs::create_dir_all(dir.join(format!(".{a}.tmp")).join("keep")).unwrap();

        let error = DirectoryStore::roll_back(
            &dir,
            &[backup],
            StoreError::Io(io::Error::other("write failed")),
        );

        assert!(matches!(
            error,
            StoreError::PartialFailure { ref applied, .. } if *applied == vec![a]
        ));
    }

    #[test]
    fn unreadable_documents_are_skipped() {
        let (tmp, store) = setup();
        store.insert(&path(), fields(json!({"n": 1}))).unwrap();
        let dir = tmp.path().join("artifacts/test/public/data/requests");
        fs::write(dir.join("broken.yaml"), "not: [valid").unwrap();

        assert_eq!(store.query_once(&path()).unwrap().len(), 1);
    }

    #[test]
    fn insert_after_delete_keeps_order() {
        let (_tmp, store) = setup();
        let a = store.insert(&path(), fields(json!({"n": 1}))).unwrap();
        let b = store.insert(&path(), fields(json!({"n": 2}))).unwrap();
        store.delete(&path(), &b).unwrap();
        let c = store.insert(&path(), fields(json!({"n": 3}))).unwrap();

        let ids: Vec<_> = store
            .query_once(&path())
            .unwrap()
            .documents
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn subscribers_are_notified_of_mutations() {
        let (_tmp, store) = setup();
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let _subscription = store
            .subscribe(
                &path(),
                Box::new(move |snapshot: &Snapshot| sink.lock().unwrap().push(snapshot.len())),
            )
            .unwrap();

        let id = store.insert(&path(), fields(json!({"n": 1}))).unwrap();
        store
            .update(&path(), &id, fields(json!({"n": 2})))
            .unwrap();
        store.delete(&path(), &id).unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![0, 1, 1, 0]);
    }
}
