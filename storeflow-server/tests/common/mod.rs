//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use shared::models::{Account, Role, collections};
use storeflow_server::AppState;
use storeflow_server::auth::MemoryIdentityProvider;
use storeflow_server::docstore::{DocumentAccess, MemoryStore};
use storeflow_server::functions::RecordingMailer;
use storeflow_server::services::ServiceContext;
use storeflow_server::storage::LocalStorage;

pub const APP_URL: &str = "https://app.storeflow.kr";
pub const SETUP_SECRET: &str = "integration-secret";

pub struct TestEnv {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub provider: Arc<MemoryIdentityProvider>,
    _dir: tempfile::TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = Arc::new(MemoryIdentityProvider::new());
        let mailer = Arc::new(RecordingMailer::new());
        let state = AppState::with_backends(
            provider.clone(),
            DocumentAccess::new(Arc::new(MemoryStore::new())),
            mailer.clone(),
            Arc::new(LocalStorage::new(dir.path(), "http://localhost/files")),
            APP_URL,
            SETUP_SECRET,
        );
        Self {
            state,
            mailer,
            provider,
            _dir: dir,
        }
    }

    pub fn access(&self) -> &DocumentAccess {
        &self.state.access
    }

    /// Active store written straight to the document store
    pub async fn seed_store(&self, id: &str) {
        let doc = json!({
            "name": format!("store {id}"),
            "businessNumber": "123-45-67890",
            "managerEmail": format!("{id}@store.kr"),
            "status": "active",
        });
        self.access()
            .create(collections::STORES, doc.as_object().cloned().unwrap(), Some(id))
            .await
            .expect("seed store");
    }

    pub async fn context(&self, role: Role, store_id: &str) -> ServiceContext {
        let id = format!("{}-{store_id}", role.as_str());
        let account = account(&id, role, (role != Role::SuperAdmin).then_some(store_id));
        ServiceContext::for_account(account, store_id, self.access().clone())
            .await
            .expect("service context")
    }
}

pub fn account(id: &str, role: Role, store_id: Option<&str>) -> Account {
    Account {
        id: id.into(),
        role,
        username: id.into(),
        name: format!("{id} name"),
        email: None,
        uid: Some(id.into()),
        store_id: store_id.map(str::to_string),
        created_at: 0,
        updated_at: 0,
    }
}
