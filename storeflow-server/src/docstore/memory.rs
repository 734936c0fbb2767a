//! In-process document store
//!
//! Behaves like the hosted backend in the ways the rest of the crate depends
//! on: composite-index enforcement, atomic batches with preconditions, and a
//! change feed. Also used by every test.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::query::{Query, compare_values};
use super::{
    ChangeEvent, Document, DocumentStore, Fields, Precondition, StoreError, StoreResult, WriteBatch, WriteOp,
};

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

type Collection = BTreeMap<String, Fields>;

pub struct MemoryStore {
    data: RwLock<HashMap<String, Collection>>,
    /// Declared composite indexes: collection → field lists
    indexes: RwLock<HashMap<String, Vec<Vec<String>>>>,
    /// When false, composite queries never fail (index-free mode)
    enforce_indexes: bool,
    denied: RwLock<HashSet<String>>,
    offline: RwLock<bool>,
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store that enforces composite indexes
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Store that serves every query directly
    pub fn without_index_checks() -> Self {
        Self::build(false)
    }

    fn build(enforce_indexes: bool) -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            data: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            enforce_indexes,
            denied: RwLock::new(HashSet::new()),
            offline: RwLock::new(false),
            tx,
        }
    }

    /// Declare a composite index. Equality fields in any order, then the
    /// range/order field last.
    pub fn with_index(self, collection: &str, fields: &[&str]) -> Self {
        self.add_index(collection, fields);
        self
    }

    pub fn add_index(&self, collection: &str, fields: &[&str]) {
        let mut fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        if let Some(last) = fields.pop() {
            fields.sort_unstable();
            fields.push(last);
        }
        self.indexes
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(fields);
    }

    /// Reject every read and write on `collection`
    pub fn deny(&self, collection: &str) {
        self.denied.write().insert(collection.to_string());
    }

    /// Simulate a lost connection
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.data.read().get(collection).map_or(0, |c| c.len())
    }

    fn check_access(&self, collection: &str) -> StoreResult<()> {
        if *self.offline.read() {
            return Err(StoreError::Unavailable("backend unreachable".into()));
        }
        if self.denied.read().contains(collection) {
            return Err(StoreError::PermissionDenied(format!(
                "access to {collection} denied"
            )));
        }
        Ok(())
    }

    fn check_index(&self, collection: &str, query: &Query) -> StoreResult<()> {
        if !self.enforce_indexes {
            return Ok(());
        }
        let Some(required) = query.composite_index_fields() else {
            return Ok(());
        };
        let indexes = self.indexes.read();
        let covered = indexes
            .get(collection)
            .is_some_and(|list| list.iter().any(|fields| *fields == required));
        if covered {
            Ok(())
        } else {
            Err(StoreError::MissingIndex {
                collection: collection.to_string(),
                fields: required.join(","),
            })
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.check_access(collection)?;
        let data = self.data.read();
        Ok(data
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.check_access(collection)?;
        self.check_index(collection, query)?;
        let docs: Vec<Document> = {
            let data = self.data.read();
            data.get(collection)
                .map(|c| {
                    c.iter()
                        .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(query.apply(docs))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        for op in &batch.ops {
            self.check_access(op.collection())?;
        }

        let events: Vec<ChangeEvent> = {
            let mut data = self.data.write();

            for pre in &batch.preconditions {
                match pre {
                    Precondition::Field {
                        collection,
                        id,
                        field,
                        expected,
                    } => {
                        let actual = data
                            .get(collection)
                            .and_then(|c| c.get(id))
                            .and_then(|doc| doc.get(field));
                        let holds = actual
                            .is_some_and(|v| compare_values(v, expected) == Some(std::cmp::Ordering::Equal));
                        if !holds {
                            return Err(StoreError::Conflict(format!("{collection}/{id} field {field} changed")));
                        }
                    }
                    Precondition::Absent { collection, id } => {
                        if data.get(collection).is_some_and(|c| c.contains_key(id)) {
                            return Err(StoreError::Conflict(format!("{collection}/{id} already exists")));
                        }
                    }
                }
            }

            for op in &batch.ops {
                if let WriteOp::Update { collection, id, .. } = op {
                    let exists = data.get(collection).is_some_and(|c| c.contains_key(id));
                    let created_earlier = batch.ops.iter().any(|o| {
                        matches!(o, WriteOp::Set { collection: c, id: i, .. } if c == collection && i == id)
                    });
                    if !exists && !created_earlier {
                        return Err(StoreError::NotFound(format!("{collection}/{id}")));
                    }
                }
            }

            let mut events = Vec::with_capacity(batch.ops.len());
            for op in batch.ops {
                events.push(ChangeEvent {
                    collection: op.collection().to_string(),
                    id: op.id().to_string(),
                });
                match op {
                    WriteOp::Set {
                        collection,
                        id,
                        data: fields,
                    } => {
                        data.entry(collection).or_default().insert(id, fields);
                    }
                    WriteOp::Update {
                        collection,
                        id,
                        patch,
                    } => {
                        if let Some(doc) = data.entry(collection).or_default().get_mut(&id) {
                            doc.extend(patch);
                        }
                    }
                    WriteOp::Delete { collection, id } => {
                        if let Some(c) = data.get_mut(&collection) {
                            c.remove(&id);
                        }
                    }
                }
            }
            events
        };

        for event in events {
            // No receivers is fine
            let _ = self.tx.send(event);
        }
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::{Direction, FilterOp};
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_composite_query_requires_index() {
        let store = MemoryStore::new();
        store
            .set("reservations", "r1", fields(json!({"storeId": "s1", "date": 10})))
            .await
            .unwrap();

        let q = Query::new()
            .eq("storeId", "s1")
            .filter("date", FilterOp::Ge, 0)
            .order_by("date", Direction::Asc);
        let err = store.query("reservations", &q).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingIndex { .. }));

        store.add_index("reservations", &["storeId", "date"]);
        let docs = store.query("reservations", &q).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_precondition_conflict_writes_nothing() {
        let store = MemoryStore::new();
        store
            .set("prepayCustomers", "c1", fields(json!({"balance": 100})))
            .await
            .unwrap();

        let batch = WriteBatch::new()
            .update("prepayCustomers", "c1", fields(json!({"balance": 50})))
            .set("prepayTransactions", "t1", fields(json!({"amount": 50})))
            .expect("prepayCustomers", "c1", "balance", 90);
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.count("prepayTransactions"), 0);

        let doc = store.get("prepayCustomers", "c1").await.unwrap().unwrap();
        assert_eq!(doc.get("balance"), Some(&json!(100)));
    }

    #[tokio::test]
    async fn test_absent_precondition() {
        let store = MemoryStore::new();
        let claim = || {
            WriteBatch::new()
                .expect_absent("claims", "k")
                .set("claims", "k", fields(json!({"owner": 1})))
        };
        store.commit(claim()).await.unwrap();
        let err = store.commit(claim()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.count("claims"), 1);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryStore::new();
        let err = store
            .update("accounts", "nope", fields(json!({"name": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("accounts/nope".into()));
    }

    #[tokio::test]
    async fn test_change_feed_reports_commits() {
        let store = MemoryStore::new();
        let mut rx = store.changes();
        store
            .set("stores", "s1", fields(json!({"name": "A"})))
            .await
            .unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.collection, "stores");
        assert_eq!(ev.id, "s1");
    }

    #[tokio::test]
    async fn test_denied_and_offline() {
        let store = MemoryStore::new();
        store.deny("accounts");
        assert!(matches!(
            store.get("accounts", "a").await,
            Err(StoreError::PermissionDenied(_))
        ));
        store.set_offline(true);
        assert!(matches!(
            store.get("stores", "a").await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
