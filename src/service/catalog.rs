use tracing::instrument;

use crate::{
    domain::{
        AccessError, CatalogEntry, Session, Title,
        catalog::{default_catalog, entry_fields, field},
    },
    service::Context,
    storage::{DocumentId, Fields, Snapshot, StoreError, Subscription},
};

/// Catalog operations bound to a [`Context`].
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    context: &'a Context,
}

impl<'a> Catalog<'a> {
    pub(crate) const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Every entry, in catalog order. Documents without a title are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn list(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        let snapshot = self
            .context
            .store()
            .query_once(self.context.catalog_collection())?;
        Ok(entries(&snapshot))
    }

    /// Entries whose title contains `term`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn search(&self, term: &str) -> Result<Vec<CatalogEntry>, StoreError> {
        let mut entries = self.list()?;
        entries.retain(|entry| entry.matches(term));
        Ok(entries)
    }

    /// Look up an entry by title.
    ///
    /// An exact match wins; otherwise a case-insensitive match is returned if
    /// it is the only one.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn find_by_title(&self, title: &str) -> Result<Option<CatalogEntry>, StoreError> {
        let entries = self.list()?;
        if let Some(exact) = entries.iter().find(|entry| entry.title.as_str() == title) {
            return Ok(Some(exact.clone()));
        }
        let mut folded = entries
            .into_iter()
            .filter(|entry| entry.title.eq_ignore_ascii_case(title));
        Ok(match (folded.next(), folded.next()) {
            (Some(entry), None) => Some(entry),
            _ => None,
        })
    }

    /// Call `listener` with the full entry list on every catalog snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    pub fn watch(
        &self,
        listener: impl Fn(&[CatalogEntry]) + Send + Sync + 'static,
    ) -> Result<Subscription, StoreError> {
        self.context.store().subscribe(
            self.context.catalog_collection(),
            Box::new(move |snapshot: &Snapshot| listener(&entries(snapshot))),
        )
    }

    /// Add an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not an administrator, the title or
    /// poster URL is blank, or the store rejects the insert.
    #[instrument(level = "debug", skip(self, session))]
    pub fn add(
        &self,
        session: &Session,
        title: &str,
        poster_url: &str,
    ) -> Result<DocumentId, CatalogError> {
        session.require_admin("add catalog entries")?;
        let title = required_title(title)?;
        let poster_url = poster_url.trim();
        if poster_url.is_empty() {
            return Err(CatalogError::MissingField(field::POSTER_URL));
        }

        let id = self
            .context
            .store()
            .insert(self.context.catalog_collection(), entry_fields(&title, poster_url))?;
        tracing::info!("Added '{title}' to the catalog as {id}");
        Ok(id)
    }

    /// Change the title and/or poster URL of an entry. Returns the updated
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not an administrator, a new title
    /// is blank, the entry does not exist, or the store rejects the update.
    #[instrument(level = "debug", skip(self, session))]
    pub fn edit(
        &self,
        session: &Session,
        id: &DocumentId,
        title: Option<&str>,
        poster_url: Option<&str>,
    ) -> Result<CatalogEntry, CatalogError> {
        session.require_admin("edit catalog entries")?;
        let mut entry = self.get(id)?;

        if let Some(title) = title {
            entry.title = required_title(title)?;
        }
        if let Some(poster_url) = poster_url {
            entry.poster_url = poster_url.trim().to_string();
        }

        self.context
            .store()
            .update(
                self.context.catalog_collection(),
                id,
                entry_fields(&entry.title, &entry.poster_url),
            )
            .map_err(|e| match e {
                StoreError::NotFound { id } => CatalogError::NotFound(id),
                other => CatalogError::Store(other),
            })?;
        tracing::info!("Updated catalog entry {id}");
        Ok(entry)
    }

    /// Remove an entry. Returns the removed entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not an administrator, the entry
    /// does not exist, or the store rejects the deletion.
    #[instrument(level = "debug", skip(self, session))]
    pub fn delete(&self, session: &Session, id: &DocumentId) -> Result<CatalogEntry, CatalogError> {
        session.require_admin("delete catalog entries")?;
        let entry = self.get(id)?;
        self.context
            .store()
            .delete(self.context.catalog_collection(), id)?;
        tracing::info!("Removed '{}' from the catalog", entry.title);
        Ok(entry)
    }

    /// Populate an empty catalog with the default titles. Returns the number
    /// of entries added, which is zero if the catalog already has content.
    ///
    /// This is a bootstrap operation and takes no session: it can only add
    /// the fixed default titles, and only to an empty catalog, so it never
    /// changes or removes anything an administrator has entered.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or written.
    pub fn seed_if_empty(&self) -> Result<usize, StoreError> {
        let collection = self.context.catalog_collection();
        if !self.context.store().query_once(collection)?.is_empty() {
            tracing::debug!("Catalog already populated; not seeding");
            return Ok(0);
        }

        let seed: Vec<Fields> = default_catalog();
        let count = seed.len();
        for fields in seed {
            self.context.store().insert(collection, fields)?;
        }
        tracing::info!("Seeded the catalog with {count} titles");
        Ok(count)
    }

    fn get(&self, id: &DocumentId) -> Result<CatalogEntry, CatalogError> {
        self.list()?
            .into_iter()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
    }
}

fn entries(snapshot: &Snapshot) -> Vec<CatalogEntry> {
    snapshot
        .documents
        .iter()
        .filter_map(|document| {
            let entry = CatalogEntry::from_document(document);
            if entry.is_none() {
                tracing::warn!("Skipping catalog entry {} without a title", document.id);
            }
            entry
        })
        .collect()
}

fn required_title(title: &str) -> Result<Title, CatalogError> {
    Title::try_from(title.trim()).map_err(|_| CatalogError::MissingField(field::TITLE))
}

/// Failure of a catalog operation.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The caller may not perform the operation.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// A required field was blank.
    #[error("'{0}' must not be empty")]
    MissingField(&'static str),
    /// No entry has the given id.
    #[error("no catalog entry with id {0}")]
    NotFound(DocumentId),
    /// The store failed.
    #[error("catalog update failed: {0}")]
    Store(#[from] StoreError),
}
