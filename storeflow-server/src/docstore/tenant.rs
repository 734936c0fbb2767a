//! Tenant-scoped document access
//!
//! Every domain record carries `storeId`. This wrapper is the single place that
//! enforces it: queries and subscriptions get an implicit `storeId ==` filter,
//! creates are stamped, and reads/writes of another store's document fail.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use shared::error::{AppError, AppResult, ErrorCode};

use super::{Document, DocumentAccess, Fields, Query, StoreResult, Subscription, WriteBatch, WriteOp, encode};

pub const STORE_ID: &str = "storeId";

#[derive(Clone)]
pub struct TenantScope {
    access: DocumentAccess,
    store_id: String,
}

impl TenantScope {
    pub fn new(access: DocumentAccess, store_id: impl Into<String>) -> Self {
        Self {
            access,
            store_id: store_id.into(),
        }
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn access(&self) -> &DocumentAccess {
        &self.access
    }

    /// Any caller-supplied `storeId` filter is replaced by ours
    fn scoped(&self, mut query: Query) -> Query {
        query.filters.retain(|f| f.field != STORE_ID);
        query.eq(STORE_ID, self.store_id.as_str())
    }

    fn check_owner(&self, collection: &str, doc: &Document) -> AppResult<()> {
        match doc.get_str(STORE_ID) {
            Some(owner) if owner == self.store_id => Ok(()),
            owner => {
                tracing::warn!(
                    collection = collection,
                    id = %doc.id,
                    owner = ?owner,
                    store_id = %self.store_id,
                    "Cross-tenant access rejected"
                );
                Err(AppError::new(ErrorCode::CrossTenantAccess)
                    .with_detail("collection", collection)
                    .with_detail("id", doc.id.clone()))
            }
        }
    }

    pub async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        let Some(doc) = self.access.get(collection, id).await? else {
            return Ok(None);
        };
        self.check_owner(collection, &doc)?;
        Ok(Some(doc))
    }

    pub async fn get_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> AppResult<Option<T>> {
        match self.get(collection, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Fetch or fail with `not_found_code`
    pub async fn require<T: DeserializeOwned>(&self, collection: &str, id: &str, not_found_code: ErrorCode) -> AppResult<T> {
        self.get_as(collection, id)
            .await?
            .ok_or_else(|| AppError::new(not_found_code).with_detail("id", id))
    }

    pub async fn query(&self, collection: &str, query: Query) -> AppResult<Vec<Document>> {
        Ok(self.access.query(collection, &self.scoped(query)).await?)
    }

    pub async fn query_as<T: DeserializeOwned>(&self, collection: &str, query: Query) -> AppResult<Vec<T>> {
        Ok(self.access.query_as(collection, &self.scoped(query)).await?)
    }

    pub async fn create(&self, collection: &str, mut data: Fields, id: Option<&str>) -> AppResult<String> {
        data.insert(STORE_ID.to_string(), Value::String(self.store_id.clone()));
        Ok(self.access.create(collection, data, id).await?)
    }

    pub async fn create_as<T: Serialize>(&self, collection: &str, record: &T) -> AppResult<String> {
        self.create(collection, encode(record)?, None).await
    }

    /// Update a document owned by this store. `storeId` cannot be changed.
    pub async fn update(&self, collection: &str, id: &str, mut patch: Fields) -> AppResult<()> {
        let doc = self
            .access
            .get(collection, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{collection}/{id}")))?;
        self.check_owner(collection, &doc)?;
        patch.remove(STORE_ID);
        Ok(self.access.update(collection, id, patch).await?)
    }

    pub async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        let Some(doc) = self.access.get(collection, id).await? else {
            return Ok(());
        };
        self.check_owner(collection, &doc)?;
        Ok(self.access.delete(collection, id).await?)
    }

    /// Commit a batch. `Set` bodies must carry this store's `storeId`
    /// (see [`TenantScope::stamp`]); updated and deleted documents must
    /// belong to this store, and `storeId` is dropped from update patches.
    pub async fn commit(&self, mut batch: WriteBatch) -> AppResult<()> {
        for op in &mut batch.ops {
            match op {
                WriteOp::Set { collection, id, data } => {
                    let owner = data.get(STORE_ID).and_then(Value::as_str);
                    if owner != Some(self.store_id.as_str()) {
                        tracing::warn!(
                            collection = %collection,
                            id = %id,
                            owner = ?owner,
                            store_id = %self.store_id,
                            "Batch write for another tenant rejected"
                        );
                        return Err(AppError::new(ErrorCode::CrossTenantAccess)
                            .with_detail("collection", collection.clone())
                            .with_detail("id", id.clone()));
                    }
                }
                WriteOp::Update { collection, id, patch } => {
                    patch.remove(STORE_ID);
                    if let Some(doc) = self.access.get(collection, id).await? {
                        self.check_owner(collection, &doc)?;
                    }
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(doc) = self.access.get(collection, id).await? {
                        self.check_owner(collection, &doc)?;
                    }
                }
            }
        }
        Ok(self.access.commit(batch).await?)
    }

    pub fn subscribe<F>(&self, collection: &str, query: Query, on_change: F) -> Subscription
    where
        F: FnMut(StoreResult<Vec<Document>>) + Send + 'static,
    {
        self.access.subscribe(collection, self.scoped(query), on_change)
    }

    pub fn subscribe_as<T, F>(&self, collection: &str, query: Query, on_change: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: FnMut(StoreResult<Vec<T>>) + Send + 'static,
    {
        self.access.subscribe_as(collection, self.scoped(query), on_change)
    }

    /// Body with `storeId` set, for batch `Set` ops
    pub fn stamp(&self, mut data: Fields) -> Fields {
        data.insert(STORE_ID.to_string(), Value::String(self.store_id.clone()));
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_queries_only_see_own_store() {
        let access = DocumentAccess::new(Arc::new(MemoryStore::new()));
        let a = TenantScope::new(access.clone(), "A");
        let b = TenantScope::new(access.clone(), "B");
        a.create("reservations", fields(json!({"customerName": "x"})), None)
            .await
            .unwrap();
        b.create("reservations", fields(json!({"customerName": "y"})), None)
            .await
            .unwrap();

        let seen = a.query("reservations", Query::new()).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get_str("customerName"), Some("x"));

        // Smuggled storeId filter is overridden
        let smuggled = a
            .query("reservations", Query::new().eq(STORE_ID, "B"))
            .await
            .unwrap();
        assert_eq!(smuggled.len(), 1);
        assert_eq!(smuggled[0].get_str(STORE_ID), Some("A"));
    }

    #[tokio::test]
    async fn test_cross_tenant_write_rejected() {
        let access = DocumentAccess::new(Arc::new(MemoryStore::new()));
        let a = TenantScope::new(access.clone(), "A");
        let b = TenantScope::new(access.clone(), "B");
        let id = b
            .create("prepayCustomers", fields(json!({"balance": 10})), None)
            .await
            .unwrap();

        let err = a.get("prepayCustomers", &id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CrossTenantAccess);
        let err = a
            .update("prepayCustomers", &id, fields(json!({"balance": 0})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CrossTenantAccess);
        let err = a.delete("prepayCustomers", &id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CrossTenantAccess);

        let doc = b.get("prepayCustomers", &id).await.unwrap().unwrap();
        assert_eq!(doc.get("balance"), Some(&json!(10)));
    }

    #[tokio::test]
    async fn test_batch_checks_every_op_owner() {
        let access = DocumentAccess::new(Arc::new(MemoryStore::new()));
        let a = TenantScope::new(access.clone(), "A");
        let b = TenantScope::new(access.clone(), "B");
        let theirs = b
            .create("prepayCustomers", fields(json!({"balance": 10})), None)
            .await
            .unwrap();

        // Unstamped and foreign-stamped sets
        let batch = WriteBatch::new().set("prepayCustomers", "x", fields(json!({"balance": 1})));
        assert_eq!(a.commit(batch).await.unwrap_err().code, ErrorCode::CrossTenantAccess);
        let batch = WriteBatch::new().set("prepayCustomers", "x", b.stamp(fields(json!({"balance": 1}))));
        assert_eq!(a.commit(batch).await.unwrap_err().code, ErrorCode::CrossTenantAccess);

        // One foreign op fails the whole batch
        let batch = WriteBatch::new()
            .set("prepayCustomers", "mine", a.stamp(fields(json!({"balance": 1}))))
            .update("prepayCustomers", &theirs, fields(json!({"balance": 0})));
        assert_eq!(a.commit(batch).await.unwrap_err().code, ErrorCode::CrossTenantAccess);
        let batch = WriteBatch::new().delete("prepayCustomers", &theirs);
        assert_eq!(a.commit(batch).await.unwrap_err().code, ErrorCode::CrossTenantAccess);
        assert!(a.get("prepayCustomers", "mine").await.unwrap().is_none());
        assert!(access.get("prepayCustomers", "x").await.unwrap().is_none());

        // Own writes go through; a patch cannot move the document
        let batch = WriteBatch::new()
            .set("prepayCustomers", "mine", a.stamp(fields(json!({"balance": 1}))))
            .update("prepayCustomers", "mine", fields(json!({"balance": 2, "storeId": "B"})));
        a.commit(batch).await.unwrap();
        let doc = a.get("prepayCustomers", "mine").await.unwrap().unwrap();
        assert_eq!(doc.get("balance"), Some(&json!(2)));
        assert_eq!(doc.get_str(STORE_ID), Some("A"));
        assert_eq!(
            b.get("prepayCustomers", &theirs).await.unwrap().unwrap().get("balance"),
            Some(&json!(10))
        );
    }
}
