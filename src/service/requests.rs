//! Visitor requests: submission, the live aggregated board, and the bulk
//! actions administrators take on a whole title at once.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::instrument;

use crate::{
    domain::{
        AccessError, Aggregation, IntegrityError, NewRequest, RequestGroup, Session, Title,
        request::action_patch,
    },
    service::Context,
    storage::{DocumentId, Snapshot, StoreError, Subscription},
};

/// Request operations bound to a [`Context`].
#[derive(Debug, Clone, Copy)]
pub struct Requests<'a> {
    context: &'a Context,
}

impl<'a> Requests<'a> {
    pub(crate) const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Record that the session's visitor would like `title` added.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the insert.
    #[instrument(level = "debug", skip(self, session), fields(visitor = %session.visitor_id()))]
    pub fn submit(&self, session: &Session, title: Title) -> Result<DocumentId, StoreError> {
        let request = NewRequest::now(title, session.visitor_id().clone());
        let title = request.movie_title.clone();
        let id = self
            .context
            .store()
            .insert(self.context.requests_collection(), request.into_fields())?;
        tracing::info!("Request {id} submitted for '{title}'");
        Ok(id)
    }

    /// Call `listener` with a fresh aggregation of every request snapshot.
    ///
    /// Each snapshot is aggregated from scratch; nothing carries over from
    /// earlier snapshots. Malformed records are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    pub fn watch(
        &self,
        listener: impl Fn(&Aggregation) + Send + Sync + 'static,
    ) -> Result<Subscription, StoreError> {
        self.context.store().subscribe(
            self.context.requests_collection(),
            Box::new(move |snapshot: &Snapshot| {
                let aggregation = Aggregation::from_snapshot(&snapshot.documents);
                for error in &aggregation.rejected {
                    tracing::warn!("Excluding malformed request: {error}");
                }
                listener(&aggregation);
            }),
        )
    }

    /// Open the live request board.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not an administrator or the
    /// subscription cannot be established.
    pub fn board(&self, session: &Session) -> Result<RequestBoard, ActionError> {
        session.require_admin("view requests")?;
        let latest = Arc::new(Mutex::new(Aggregation::default()));
        let sink = Arc::clone(&latest);
        let subscription = self.watch(move |aggregation| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = aggregation.clone();
        })?;
        Ok(RequestBoard {
            latest,
            _subscription: subscription,
        })
    }

    /// Mark every request in `group` done, or every one undone if the group
    /// is already fully actioned. Returns the new state.
    ///
    /// All members are written in one atomic batch. The caller's view is
    /// refreshed by the next snapshot, not by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not an administrator or the batch
    /// fails. A failed batch leaves no member changed unless the error is a
    /// [`StoreError::PartialFailure`].
    #[instrument(level = "debug", skip(self, session, group), fields(title = %group.movie_title))]
    pub fn toggle_actioned(
        &self,
        session: &Session,
        group: &RequestGroup,
    ) -> Result<bool, ActionError> {
        session.require_admin("update requests")?;
        let action_taken = !group.all_actioned;
        let patches = group
            .member_ids
            .iter()
            .map(|id| (id.clone(), action_patch(action_taken)))
            .collect();

        self.context
            .store()
            .batched_update(self.context.requests_collection(), patches)
            .inspect_err(|e| tracing::error!("Failed to update '{}': {e}", group.movie_title))?;

        tracing::info!(
            "Marked {} requests for '{}' as {}",
            group.request_count(),
            group.movie_title,
            if action_taken { "done" } else { "not done" }
        );
        Ok(action_taken)
    }

    /// Delete every request in `group` in one atomic batch. Returns the
    /// number of requests in the group.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not an administrator or the batch
    /// fails.
    #[instrument(level = "debug", skip(self, session, group), fields(title = %group.movie_title))]
    pub fn delete_group(&self, session: &Session, group: &RequestGroup) -> Result<usize, ActionError> {
        session.require_admin("delete requests")?;
        let ids: Vec<_> = group.member_ids.iter().cloned().collect();
        let count = ids.len();

        self.context
            .store()
            .batched_delete(self.context.requests_collection(), ids)
            .inspect_err(|e| tracing::error!("Failed to delete '{}': {e}", group.movie_title))?;

        tracing::info!("Deleted {count} requests for '{}'", group.movie_title);
        Ok(count)
    }
}

/// The latest aggregated view of the request collection.
///
/// Kept current by a live subscription, which is cancelled when the board is
/// dropped.
#[derive(Debug)]
pub struct RequestBoard {
    latest: Arc<Mutex<Aggregation>>,
    _subscription: Subscription,
}

impl RequestBoard {
    /// A copy of the current aggregation.
    #[must_use]
    pub fn aggregation(&self) -> Aggregation {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current ordered groups.
    #[must_use]
    pub fn groups(&self) -> Vec<RequestGroup> {
        self.aggregation().groups
    }

    /// Records excluded from the current aggregation.
    #[must_use]
    pub fn rejected(&self) -> Vec<IntegrityError> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rejected
            .clone()
    }

    /// The current group for an exact title.
    #[must_use]
    pub fn find(&self, title: &str) -> Option<RequestGroup> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(title)
            .cloned()
    }
}

/// Failure of a request action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The caller may not perform the action.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// The store rejected the mutation.
    #[error("request update failed: {0}")]
    Store(#[from] StoreError),
}

impl ActionError {
    /// Whether the store was left with only part of the batch applied.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Store(StoreError::PartialFailure { .. }))
    }
}
