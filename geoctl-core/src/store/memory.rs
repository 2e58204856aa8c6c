//! In-memory backend
//!
//! Backs tests and `geoctl serve --in-memory`. Documents live in insertion
//! order per collection; unique indexes are enforced on insert and update.
//! The store can be taken offline and can have its open sessions dropped,
//! which is how tests simulate a lost database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{Document, DocumentStore, Filter, FindOptions, StoreError};
use crate::connection::Connector;

#[derive(Default)]
struct Collection {
    docs: Vec<Document>,
    unique: Vec<Vec<String>>,
}

impl Collection {
    fn key_of(doc: &Document, fields: &[String]) -> Vec<Option<Value>> {
        fields.iter().map(|f| doc.get(f).cloned()).collect()
    }

    /// First unique index that `doc` would violate, ignoring the document at
    /// `skip` (the one being updated).
    fn violation(&self, doc: &Document, skip: Option<usize>) -> Option<String> {
        self.unique.iter().find_map(|fields| {
            let key = Self::key_of(doc, fields);
            self.docs
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, other)| Self::key_of(other, fields) == key)
                .then(|| format!("unique index on ({}) violated", fields.join(", ")))
        })
    }
}

/// Shared in-memory database
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
    offline: AtomicBool,
    epoch: AtomicU64,
    pending_failures: AtomicUsize,
    operations: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the database offline (every call and connect fails) or back online.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    /// Invalidate every open session, as a server restart would.
    pub fn drop_connections(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Make the next `n` calls fail with a connection error.
    pub fn fail_next(&self, n: usize) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Calls that reached the data (pings included).
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Documents currently in `collection`, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock()
            .get(collection)
            .map(|c| c.docs.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Collection>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Connector handing out sessions on a [`MemoryStore`]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of connect calls so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.store.is_online() {
            return Err(StoreError::Connection("memory store is offline".into()));
        }
        Ok(Arc::new(MemorySession {
            store: Arc::clone(&self.store),
            epoch: self.store.epoch.load(Ordering::SeqCst),
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// One connection to a [`MemoryStore`]; dies when the store drops connections
struct MemorySession {
    store: Arc<MemoryStore>,
    epoch: u64,
}

impl MemorySession {
    fn check(&self) -> Result<&MemoryStore, StoreError> {
        let store = &*self.store;
        if !store.is_online() {
            return Err(StoreError::Connection("memory store is offline".into()));
        }
        if store.epoch.load(Ordering::SeqCst) != self.epoch {
            return Err(StoreError::Connection("connection reset".into()));
        }
        if store.take_failure() {
            return Err(StoreError::Connection("injected failure".into()));
        }
        store.operations.fetch_add(1, Ordering::SeqCst);
        Ok(store)
    }
}

#[async_trait]
impl DocumentStore for MemorySession {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check().map(|_| ())
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let mut collections = self.check()?.lock();
        let coll = collections.entry(collection.to_string()).or_default();
        if let Some(violation) = coll.violation(&doc, None) {
            return Err(StoreError::DuplicateKey(violation));
        }
        coll.docs.push(doc);
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.check()?.lock();
        Ok(collections
            .get(collection)
            .and_then(|c| c.docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.check()?.lock();
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut docs: Vec<&Document> = coll.docs.iter().filter(|d| filter.matches(d)).collect();
        if let Some(sort) = &options.sort {
            docs.sort_by(|a, b| sort.compare(a, b));
        }
        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(docs.into_iter().skip(skip).take(limit).cloned().collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.check()?.lock();
        Ok(collections
            .get(collection)
            .map(|c| c.docs.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<u64, StoreError> {
        let mut collections = self.check()?.lock();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let Some(index) = coll.docs.iter().position(|d| filter.matches(d)) else {
            return Ok(0);
        };
        let mut updated = coll.docs[index].clone();
        updated.extend(set);
        if let Some(violation) = coll.violation(&updated, Some(index)) {
            return Err(StoreError::DuplicateKey(violation));
        }
        coll.docs[index] = updated;
        Ok(1)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.check()?.lock();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match coll.docs.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                coll.docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn ensure_unique_index(
        &self,
        collection: &str,
        fields: &[&str],
    ) -> Result<(), StoreError> {
        let mut collections = self.check()?.lock();
        let coll = collections.entry(collection.to_string()).or_default();
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        if !coll.unique.contains(&fields) {
            coll.unique.push(fields);
        }
        Ok(())
    }
}
