//! In-memory document store with per-document locking.
//!
//! [`MemoryStore`] keeps every document in a `HashMap` where each entry is
//! individually protected by a [`tokio::sync::Mutex`]. Writes to different
//! documents proceed concurrently; writes to the same document are
//! serialized, which makes each `transact` an atomic read-modify-write.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, broadcast};

use super::{Document, DocumentStore, DocumentWatch};
use crate::error::MeetupError;

/// Default capacity of the change feed.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Process-local [`DocumentStore`].
///
/// # Concurrency
///
/// - Reads of different documents never block each other.
/// - Writes to the same document are serialized and applied to a draft
///   copy, so a failing write leaves no partial state behind.
/// - Change notifications are sent while the document lock is held, so
///   subscribers observe snapshots of one document in commit order.
#[derive(Debug)]
pub struct MemoryStore<D: Document> {
    docs: RwLock<HashMap<D::Id, Arc<Mutex<D>>>>,
    changes: broadcast::Sender<D>,
}

impl<D: Document> MemoryStore<D> {
    /// Creates an empty store with the default change-feed capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Creates an empty store whose change feed buffers `capacity`
    /// snapshots per lagging subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            docs: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Returns `true` if the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    async fn entry(&self, id: D::Id) -> Result<Arc<Mutex<D>>, MeetupError> {
        let map = self.docs.read().await;
        map.get(&id).cloned().ok_or_else(|| MeetupError::NotFound {
            kind: D::KIND,
            id: id.to_string(),
        })
    }
}

impl<D: Document> Default for MemoryStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> DocumentStore<D> for MemoryStore<D> {
    async fn get(&self, id: D::Id) -> Result<Option<D>, MeetupError> {
        let entry = {
            let map = self.docs.read().await;
            map.get(&id).cloned()
        };
        match entry {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn create(&self, doc: D) -> Result<(D, bool), MeetupError> {
        let id = doc.id();
        let mut map = self.docs.write().await;
        if let Some(existing) = map.get(&id) {
            let existing = Arc::clone(existing);
            drop(map);
            return Ok((existing.lock().await.clone(), false));
        }
        map.insert(id, Arc::new(Mutex::new(doc.clone())));
        let _ = self.changes.send(doc.clone());
        tracing::debug!(kind = D::KIND, %id, "document created");
        Ok((doc, true))
    }

    async fn transact<F, R>(&self, id: D::Id, f: F) -> Result<R, MeetupError>
    where
        F: FnOnce(&mut D) -> Result<R, MeetupError> + Send,
        R: Send,
    {
        let entry = self.entry(id).await?;
        let mut current = entry.lock().await;

        let mut draft = current.clone();
        let out = f(&mut draft)?;
        if draft.id() != id {
            return Err(MeetupError::Internal(format!(
                "{} {id} attempted to change its id",
                D::KIND
            )));
        }

        if draft != *current {
            *current = draft;
            let _ = self.changes.send(current.clone());
        }
        Ok(out)
    }

    fn subscribe(&self, id: D::Id) -> DocumentWatch<D> {
        DocumentWatch::new(id, self.changes.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::store::testing::Counter;

    #[tokio::test]
    async fn create_is_insert_if_absent() {
        let store = MemoryStore::new();
        let Ok((_, created)) = store.create(Counter::new(1)).await else {
            panic!("create failed");
        };
        assert!(created);

        let mut dup = Counter::new(1);
        dup.value = 99;
        let Ok((stored, created)) = store.create(dup).await else {
            panic!("create failed");
        };
        assert!(!created);
        assert_eq!(stored.value, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store: MemoryStore<Counter> = MemoryStore::new();
        assert!(matches!(store.get(7).await, Ok(None)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn transact_on_missing_is_not_found() {
        let store: MemoryStore<Counter> = MemoryStore::new();
        let result = store.transact(7, |c| Ok(c.value)).await;
        assert!(matches!(result, Err(MeetupError::NotFound { kind: "counter", .. })));
    }

    #[tokio::test]
    async fn failed_transaction_writes_nothing() {
        let store = MemoryStore::new();
        let _ = store.create(Counter::new(1)).await;

        let result: Result<(), MeetupError> = store
            .transact(1, |c| {
                c.value = 42;
                Err(MeetupError::InvalidState("abort".into()))
            })
            .await;
        assert!(result.is_err());

        let Ok(Some(stored)) = store.get(1).await else {
            panic!("document missing");
        };
        assert_eq!(stored.value, 0);
    }

    #[tokio::test]
    async fn concurrent_transactions_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        let _ = store.create(Counter::new(1)).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .transact(1, |c| {
                        c.value += 1;
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            let Ok(Ok(())) = handle.await else {
                panic!("transaction failed");
            };
        }

        let Ok(Some(stored)) = store.get(1).await else {
            panic!("document missing");
        };
        assert_eq!(stored.value, 50);
    }

    #[tokio::test]
    async fn merge_write_applies_patch() {
        let store = MemoryStore::new();
        let _ = store.create(Counter::new(1)).await;
        let Ok(merged) = store.merge_write(1, 5).await else {
            panic!("merge failed");
        };
        assert_eq!(merged.value, 5);
    }

    #[tokio::test]
    async fn subscribe_filters_by_id_and_skips_no_ops() {
        let store = MemoryStore::new();
        let _ = store.create(Counter::new(1)).await;
        let _ = store.create(Counter::new(2)).await;
        let mut watch = store.subscribe(1);

        let _ = store.merge_write(2, 3).await;
        // No-op write: value unchanged, nothing published.
        let _ = store.transact(1, |_| Ok(())).await;
        let _ = store.merge_write(1, 9).await;

        let Some(doc) = watch.changed().await else {
            panic!("expected a change");
        };
        assert_eq!(doc.id, 1);
        assert_eq!(doc.value, 9);
        assert_eq!(watch.id(), 1);
    }
}
