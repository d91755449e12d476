//! Document store layer.
//!
//! Meetup state lives in two document collections (invites and sessions).
//! [`DocumentStore`] is the minimal contract the services need from a
//! backing store: read by id, insert-if-absent, atomic read-modify-write,
//! typed partial merges, and a per-document change feed. [`MemoryStore`] is
//! the in-process implementation.

pub mod memory;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::future::Future;
use std::hash::Hash;

use tokio::sync::broadcast;

use crate::error::MeetupError;

pub use memory::MemoryStore;

/// A value stored as one document, addressed by its own id.
pub trait Document: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Collection name used in errors and logs.
    const KIND: &'static str;

    /// Primary key type.
    type Id: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Partial update understood by [`Document::merge`].
    type Patch: Send + 'static;

    /// Returns the document id. Must never change after creation.
    fn id(&self) -> Self::Id;

    /// Applies a partial update in place, leaving unrelated fields alone.
    ///
    /// # Errors
    ///
    /// Returns a [`MeetupError`] if the patch is not valid against the
    /// current document; the store then discards the whole write.
    fn merge(&mut self, patch: Self::Patch) -> Result<(), MeetupError>;
}

/// Contract of a document-oriented store.
///
/// Every write is atomic per document: concurrent writers to the same
/// document are serialized, and a failed closure or patch leaves the stored
/// document untouched.
pub trait DocumentStore<D: Document>: Send + Sync {
    /// Reads a document by id.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::StoreUnavailable`] on transient failure.
    fn get(&self, id: D::Id) -> impl Future<Output = Result<Option<D>, MeetupError>> + Send;

    /// Inserts `doc` unless a document with the same id exists.
    ///
    /// Returns the stored document and whether this call created it.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::StoreUnavailable`] on transient failure.
    fn create(&self, doc: D) -> impl Future<Output = Result<(D, bool), MeetupError>> + Send;

    /// Runs `f` against the current document and commits its changes
    /// atomically. If `f` fails nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::NotFound`] for a missing document, the error
    /// returned by `f`, or [`MeetupError::StoreUnavailable`].
    fn transact<F, R>(
        &self,
        id: D::Id,
        f: F,
    ) -> impl Future<Output = Result<R, MeetupError>> + Send
    where
        F: FnOnce(&mut D) -> Result<R, MeetupError> + Send,
        R: Send;

    /// Applies a typed partial update atomically and returns the merged
    /// document.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::transact`].
    fn merge_write(
        &self,
        id: D::Id,
        patch: D::Patch,
    ) -> impl Future<Output = Result<D, MeetupError>> + Send {
        self.transact(id, move |doc| {
            doc.merge(patch)?;
            Ok(doc.clone())
        })
    }

    /// Subscribes to committed changes of one document. Dropping the watch
    /// unsubscribes.
    fn subscribe(&self, id: D::Id) -> DocumentWatch<D>;
}

/// Live feed of committed snapshots of a single document.
#[derive(Debug)]
pub struct DocumentWatch<D: Document> {
    id: D::Id,
    rx: broadcast::Receiver<D>,
}

impl<D: Document> DocumentWatch<D> {
    /// Wraps a receiver of the store-wide change feed, keeping only
    /// snapshots of `id`.
    #[must_use]
    pub fn new(id: D::Id, rx: broadcast::Receiver<D>) -> Self {
        Self { id, rx }
    }

    /// Returns the id this watch is bound to.
    #[must_use]
    pub fn id(&self) -> D::Id {
        self.id
    }

    /// Waits for the next committed snapshot of the watched document.
    ///
    /// Returns `None` once the store is gone. Snapshots skipped because the
    /// subscriber lagged are not replayed; the next one is the latest state.
    pub async fn changed(&mut self) -> Option<D> {
        loop {
            match self.rx.recv().await {
                Ok(doc) if doc.id() == self.id => return Some(doc),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(kind = D::KIND, id = %self.id, lagged = n, "document watch lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
