//! Test doubles for the store layer.

use std::sync::atomic::{AtomicU32, Ordering};

use super::{Document, DocumentStore, DocumentWatch, MemoryStore};
use crate::error::MeetupError;

/// Minimal document used to exercise store semantics.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Counter {
    pub id: u32,
    pub value: u32,
}

impl Counter {
    pub(crate) fn new(id: u32) -> Self {
        Self { id, value: 0 }
    }
}

impl Document for Counter {
    const KIND: &'static str = "counter";
    type Id = u32;
    type Patch = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn merge(&mut self, patch: u32) -> Result<(), MeetupError> {
        self.value = patch;
        Ok(())
    }
}

/// Wraps a [`MemoryStore`] and fails the next `n` reads and writes with
/// [`MeetupError::StoreUnavailable`].
#[derive(Debug)]
pub(crate) struct FlakyStore<D: Document> {
    inner: MemoryStore<D>,
    failures_left: AtomicU32,
}

impl<D: Document> FlakyStore<D> {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(0),
        }
    }

    pub(crate) fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), MeetupError> {
        let took = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match took {
            Ok(_) => Err(MeetupError::StoreUnavailable("injected failure".into())),
            Err(_) => Ok(()),
        }
    }
}

impl<D: Document> DocumentStore<D> for FlakyStore<D> {
    async fn get(&self, id: D::Id) -> Result<Option<D>, MeetupError> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn create(&self, doc: D) -> Result<(D, bool), MeetupError> {
        self.check()?;
        self.inner.create(doc).await
    }

    async fn transact<F, R>(&self, id: D::Id, f: F) -> Result<R, MeetupError>
    where
        F: FnOnce(&mut D) -> Result<R, MeetupError> + Send,
        R: Send,
    {
        self.check()?;
        self.inner.transact(id, f).await
    }

    fn subscribe(&self, id: D::Id) -> DocumentWatch<D> {
        self.inner.subscribe(id)
    }
}
