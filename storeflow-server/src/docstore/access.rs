//! Generic CRUD, query and live-query access over a [`DocumentStore`]

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use shared::util::{new_id, now_millis};

use super::{
    Document, DocumentStore, Fields, Query, StoreError, StoreResult, Subscription, WriteBatch,
    WriteOp, encode,
};

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

#[derive(Clone)]
pub struct DocumentAccess {
    store: Arc<dyn DocumentStore>,
}

impl DocumentAccess {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.store.get(collection, id).await
    }

    pub async fn get_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> StoreResult<Option<T>> {
        self.get(collection, id)
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Run a query, degrading when the backend lacks a composite index.
    ///
    /// Degraded plan: equality filters server side, then range filters,
    /// ordering and limit (in that order) client side. Any error other than
    /// `MissingIndex` is returned unchanged.
    pub async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        match self.store.query(collection, query).await {
            Err(StoreError::MissingIndex { fields, .. }) => {
                tracing::warn!(
                    collection = collection,
                    fields = %fields,
                    "Composite index missing, falling back to client-side filtering"
                );
                let base = self.store.query(collection, &query.equality_only()).await?;
                Ok(query.apply(base))
            }
            other => other,
        }
    }

    pub async fn query_as<T: DeserializeOwned>(&self, collection: &str, query: &Query) -> StoreResult<Vec<T>> {
        self.query(collection, query)
            .await?
            .iter()
            .map(Document::decode)
            .collect()
    }

    /// Insert a document, stamping `createdAt` and `updatedAt`.
    /// Returns the (possibly generated) id.
    pub async fn create(&self, collection: &str, mut data: Fields, id: Option<&str>) -> StoreResult<String> {
        let id = id.map(str::to_string).unwrap_or_else(new_id);
        stamp_create(&mut data);
        self.store.set(collection, &id, data).await?;
        tracing::debug!(collection = collection, id = %id, "Document created");
        Ok(id)
    }

    pub async fn create_as<T: Serialize>(&self, collection: &str, record: &T, id: Option<&str>) -> StoreResult<String> {
        self.create(collection, encode(record)?, id).await
    }

    /// Merge `patch` into an existing document. Only `updatedAt` is stamped;
    /// a `createdAt` in the patch is ignored.
    pub async fn update(&self, collection: &str, id: &str, mut patch: Fields) -> StoreResult<()> {
        stamp_update(&mut patch);
        self.store.update(collection, id, patch).await
    }

    /// Hard delete, no cascade
    pub async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.store.delete(collection, id).await
    }

    /// Atomic batch. `Set` ops are stamped like `create` (an existing
    /// `createdAt` is kept), `Update` ops like `update`.
    pub async fn commit(&self, mut batch: WriteBatch) -> StoreResult<()> {
        for op in &mut batch.ops {
            match op {
                WriteOp::Set { data, .. } => stamp_create(data),
                WriteOp::Update { patch, .. } => stamp_update(patch),
                WriteOp::Delete { .. } => {}
            }
        }
        self.store.commit(batch).await
    }

    /// Live query.
    ///
    /// `on_change` receives the full result set once immediately and again
    /// after every committed write to `collection`. An error is delivered
    /// once and ends the subscription.
    pub fn subscribe<F>(&self, collection: &str, query: Query, mut on_change: F) -> Subscription
    where
        F: FnMut(StoreResult<Vec<Document>>) + Send + 'static,
    {
        let token = CancellationToken::new();
        let sub = Subscription::new(token.clone());
        let access = self.clone();
        let collection = collection.to_string();
        let mut changes = self.store.changes();

        tokio::spawn(async move {
            loop {
                let result = access.query(&collection, &query).await;
                if token.is_cancelled() {
                    break;
                }
                let failed = result.is_err();
                on_change(result);
                if failed {
                    tracing::debug!(collection = %collection, "Subscription ended after error");
                    break;
                }

                // Wait for the next relevant change
                loop {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        event = changes.recv() => match event {
                            Ok(ev) if ev.collection == collection => break,
                            Ok(_) => continue,
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::debug!(skipped, "Change feed lagged, re-running query");
                                break;
                            }
                            Err(RecvError::Closed) => return,
                        }
                    }
                }
            }
        });

        sub
    }

    /// Typed live query
    pub fn subscribe_as<T, F>(&self, collection: &str, query: Query, mut on_change: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: FnMut(StoreResult<Vec<T>>) + Send + 'static,
    {
        self.subscribe(collection, query, move |result| {
            on_change(result.and_then(|docs| docs.iter().map(Document::decode).collect()));
        })
    }
}

fn stamp_create(data: &mut Fields) {
    let now = Value::from(now_millis());
    if !data.get(CREATED_AT).is_some_and(|v| !v.is_null()) {
        data.insert(CREATED_AT.to_string(), now.clone());
    }
    data.insert(UPDATED_AT.to_string(), now);
}

fn stamp_update(patch: &mut Fields) {
    patch.remove(CREATED_AT);
    patch.insert(UPDATED_AT.to_string(), Value::from(now_millis()));
}
