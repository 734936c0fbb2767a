//! Document Access Layer
//!
//! ```text
//!   services ──► TenantScope ──► DocumentAccess ──► dyn DocumentStore
//!                (storeId)       (timestamps,        (memory / remote)
//!                                 index fallback,
//!                                 subscriptions)
//! ```
//!
//! Documents are schemaless JSON objects at this level; typed records from
//! `shared::models` are encoded/decoded at the [`DocumentAccess`] boundary.

mod access;
mod error;
mod memory;
mod query;
mod subscription;
mod tenant;

pub use access::DocumentAccess;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{Direction, Filter, FilterOp, OrderBy, Query, compare_values, timestamp_millis};
pub use subscription::{Subscription, SubscriptionSet};
pub use tenant::{STORE_ID, TenantScope};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Document body
pub type Fields = Map<String, Value>;

/// A stored document: id plus body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    /// Decode into a typed record; the id is injected as `id`
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// Encode a typed record into a document body, dropping its `id`
pub fn encode<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Change notification emitted after every committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace
    Set {
        collection: String,
        id: String,
        data: Fields,
    },
    /// Merge fields into an existing document
    Update {
        collection: String,
        id: String,
        patch: Fields,
    },
    Delete { collection: String, id: String },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Set { id, .. } | WriteOp::Update { id, .. } | WriteOp::Delete { id, .. } => id,
        }
    }
}

/// Condition that must still hold when the batch commits
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// Field still has the value read earlier
    Field {
        collection: String,
        id: String,
        field: String,
        expected: Value,
    },
    /// Document does not exist
    Absent { collection: String, id: String },
}

/// Atomic multi-document write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
    pub preconditions: Vec<Precondition>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, collection: &str, id: &str, data: Fields) -> Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    pub fn update(mut self, collection: &str, id: &str, patch: Fields) -> Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        });
        self
    }

    pub fn delete(mut self, collection: &str, id: &str) -> Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn expect(mut self, collection: &str, id: &str, field: &str, expected: impl Into<Value>) -> Self {
        self.preconditions.push(Precondition::Field {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            expected: expected.into(),
        });
        self
    }

    pub fn expect_absent(mut self, collection: &str, id: &str) -> Self {
        self.preconditions.push(Precondition::Absent {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Backend contract
///
/// `query` may fail with [`StoreError::MissingIndex`]; recovering from that is
/// the access layer's job, not the backend's.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Apply every op or none. Fails with `Conflict` when a precondition
    /// does not hold and with `NotFound` when an update targets a missing
    /// document.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Stream of committed changes
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;

    async fn set(&self, collection: &str, id: &str, data: Fields) -> StoreResult<()> {
        self.commit(WriteBatch::new().set(collection, id, data)).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreResult<()> {
        self.commit(WriteBatch::new().update(collection, id, patch)).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.commit(WriteBatch::new().delete(collection, id)).await
    }
}
