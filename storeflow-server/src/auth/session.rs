//! Session resolution
//!
//! ```text
//!   provider user? ──yes──► accounts/{uid} ─┐
//!        │no                                 │
//!   staff token?  ──yes──► accounts/{sub} ───┤  (missing → token cleared)
//!        │no                                 ▼
//!   signed out             role needs store? account.storeId
//!   (clear last store)        └─ fallback: last selected store ─► stores/{id}
//! ```
//!
//! Resolution re-runs on every provider auth change. Each run takes a
//! generation number; a run that finishes after a newer one started is
//! discarded, so the published state always reflects the latest auth event.
//! The same check gates the persisted session writes (token clean-up, last
//! selected store), so an overtaken run leaves no trace.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Account, Feature, Role, Store, collections};

use super::permissions::Capabilities;
use super::provider::{IdentityProvider, ProviderUser};
use super::staff_session::{StaffSession, StaffSessionStore};
use crate::docstore::DocumentAccess;

/// How the current user authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Provider(ProviderUser),
    LocalStaff(StaffSession),
}

/// Normalized identity, independent of the login path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub account_id: String,
    pub tenant_id: Option<String>,
    pub role: Role,
}

/// Published session snapshot
#[derive(Debug, Clone)]
pub struct SessionState {
    /// True until the first resolution completes
    pub loading: bool,
    pub identity: Option<Identity>,
    pub account: Option<Account>,
    pub store: Option<Store>,
    pub tenant_id: Option<String>,
    /// Non-fatal resolution problem (no store for a store-bound role, ...)
    pub error: Option<AppError>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            loading: true,
            identity: None,
            account: None,
            store: None,
            tenant_id: None,
            error: None,
        }
    }
}

impl SessionState {
    fn signed_out() -> Self {
        Self {
            loading: false,
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::derive(self.account.as_ref())
    }

    /// Unknown store → nothing is disabled
    pub fn is_feature_disabled(&self, feature: Feature) -> bool {
        self.store
            .as_ref()
            .is_some_and(|s| s.is_feature_disabled(feature))
    }

    pub fn role(&self) -> Option<Role> {
        self.account.as_ref().map(|a| a.role)
    }

    pub fn principal(&self) -> Option<Principal> {
        let account = self.account.as_ref()?;
        Some(Principal {
            account_id: account.id.clone(),
            tenant_id: self.tenant_id.clone(),
            role: account.role,
        })
    }

    pub fn missing_tenant(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.code == ErrorCode::TenantNotSelected)
    }
}

pub struct SessionResolver {
    provider: Arc<dyn IdentityProvider>,
    access: DocumentAccess,
    staff_sessions: Arc<StaffSessionStore>,
    generation: AtomicU64,
    /// Held while comparing the generation and acting on the result
    current: Mutex<()>,
    state: watch::Sender<SessionState>,
}

impl SessionResolver {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        access: DocumentAccess,
        staff_sessions: Arc<StaffSessionStore>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            provider,
            access,
            staff_sessions,
            generation: AtomicU64::new(0),
            current: Mutex::new(()),
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn staff_sessions(&self) -> &Arc<StaffSessionStore> {
        &self.staff_sessions
    }

    /// Run one resolution and publish it unless a newer run has started
    /// meanwhile. Returns the state this run computed.
    pub async fn resolve(&self) -> SessionState {
        let generation = {
            let _current = self.current.lock();
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        let computed = self.compute(generation).await;

        let _current = self.current.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            self.state.send_replace(computed.clone());
        } else {
            tracing::debug!(generation, "Superseded session resolution discarded");
        }
        computed
    }

    /// Apply a persisted session write only while `generation` is the newest run
    fn persist(&self, generation: u64, write: impl FnOnce(&StaffSessionStore) -> AppResult<()>) -> AppResult<()> {
        let _current = self.current.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "Superseded session resolution, session left untouched");
            return Ok(());
        }
        write(self.staff_sessions.as_ref())
    }

    /// Re-resolve on every provider auth-state change until cancelled
    pub fn spawn_auth_listener(self: &Arc<Self>) -> CancellationToken {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let resolver = Arc::clone(self);
        let mut auth = self.provider.watch();

        tokio::spawn(async move {
            resolver.resolve().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = auth.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // Each change gets its own run; late finishers are discarded
                        let r = Arc::clone(&resolver);
                        tokio::spawn(async move {
                            r.resolve().await;
                        });
                    }
                }
            }
        });

        token
    }

    async fn compute(&self, generation: u64) -> SessionState {
        match self.compute_inner(generation).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(code = %err.code, error = %err, "Session resolution failed");
                SessionState {
                    loading: false,
                    error: Some(err),
                    ..SessionState::default()
                }
            }
        }
    }

    async fn compute_inner(&self, generation: u64) -> AppResult<SessionState> {
        let (identity, account, session_tenant) = if let Some(user) = self.provider.current() {
            let account = self
                .access
                .get_as::<Account>(collections::ACCOUNTS, &user.uid)
                .await?;
            (Identity::Provider(user), account, None)
        } else if let Some(staff) = self.staff_sessions.load() {
            let account = self
                .access
                .get_as::<Account>(collections::ACCOUNTS, &staff.account_id)
                .await?;
            let Some(account) = account else {
                tracing::info!(account_id = %staff.account_id, "Staff account gone, clearing session");
                self.persist(generation, |sessions| {
                    sessions.clear()?;
                    sessions.clear_last_tenant()
                })?;
                return Ok(SessionState::signed_out());
            };
            let tenant = staff.tenant_id.clone();
            (Identity::LocalStaff(staff), Some(account), Some(tenant))
        } else {
            self.persist(generation, StaffSessionStore::clear_last_tenant)?;
            return Ok(SessionState::signed_out());
        };

        let mut state = SessionState {
            loading: false,
            identity: Some(identity),
            account: account.clone(),
            ..SessionState::default()
        };

        let Some(account) = account else {
            // Provider user without an account document
            return Ok(state);
        };

        if !account.role.requires_tenant() {
            return Ok(state);
        }

        let tenant_id = account
            .store_id
            .clone()
            .or(session_tenant)
            .or_else(|| self.staff_sessions.last_tenant());
        let Some(tenant_id) = tenant_id else {
            state.error = Some(
                AppError::new(ErrorCode::TenantNotSelected).with_detail("accountId", account.id),
            );
            return Ok(state);
        };

        self.persist(generation, |sessions| sessions.set_last_tenant(&tenant_id))?;
        state.store = self
            .access
            .get_as::<Store>(collections::STORES, &tenant_id)
            .await?;
        if state.store.is_none() {
            state.error =
                Some(AppError::new(ErrorCode::TenantNotFound).with_detail("storeId", tenant_id.clone()));
        }
        state.tenant_id = Some(tenant_id);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::MemoryIdentityProvider;
    use crate::auth::staff_session::{MemorySessionStorage, STAFF_SESSION_KEY, SessionStorage};
    use crate::docstore::{
        ChangeEvent, Document, DocumentStore, MemoryStore, Query, StoreResult, WriteBatch,
    };
    use serde_json::json;

    struct Fixture {
        provider: Arc<MemoryIdentityProvider>,
        access: DocumentAccess,
        storage: Arc<MemorySessionStorage>,
        resolver: SessionResolver,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let access = DocumentAccess::new(Arc::new(MemoryStore::new()));
        let storage = Arc::new(MemorySessionStorage::new());
        let sessions = Arc::new(StaffSessionStore::new(storage.clone(), "test-secret"));
        let resolver = SessionResolver::new(provider.clone(), access.clone(), sessions);
        Fixture {
            provider,
            access,
            storage,
            resolver,
        }
    }

    async fn seed(access: &DocumentAccess, id: &str, doc: serde_json::Value) {
        let (collection, id) = id.split_once('/').unwrap();
        access
            .create(collection, doc.as_object().cloned().unwrap(), Some(id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let f = fixture();
        assert!(f.resolver.state().loading);
        let state = f.resolver.resolve().await;
        assert!(!state.loading);
        assert!(!state.is_authenticated());
        assert!(!f.resolver.state().loading);
    }

    #[tokio::test]
    async fn test_store_admin_resolves_store() {
        let f = fixture();
        f.provider.insert_user("u1", "boss@a.kr", "pw").unwrap();
        seed(&f.access, "accounts/u1", json!({"role": "storeAdmin", "username": "boss",
            "name": "Boss", "uid": "u1", "storeId": "A"})).await;
        seed(&f.access, "stores/A", json!({"name": "Store A", "managerEmail": "boss@a.kr",
            "disabledFeatures": {"prepay": true}})).await;

        f.provider.sign_in("boss@a.kr", "pw").await.unwrap();
        let state = f.resolver.resolve().await;
        assert!(state.is_authenticated());
        assert_eq!(state.tenant_id.as_deref(), Some("A"));
        assert_eq!(state.store.as_ref().map(|s| s.name.as_str()), Some("Store A"));
        assert!(state.is_feature_disabled(Feature::Prepay));
        assert!(!state.is_feature_disabled(Feature::Hr));
        assert!(state.capabilities().can_manage_store);
    }

    #[tokio::test]
    async fn test_missing_tenant_is_non_fatal() {
        let f = fixture();
        f.provider.insert_user("u2", "x@a.kr", "pw").unwrap();
        seed(&f.access, "accounts/u2", json!({"role": "storeAdmin", "username": "x",
            "name": "X", "uid": "u2"})).await;
        f.provider.sign_in("x@a.kr", "pw").await.unwrap();

        let state = f.resolver.resolve().await;
        assert!(state.is_authenticated());
        assert!(state.missing_tenant());
        assert!(state.store.is_none());
    }

    #[tokio::test]
    async fn test_last_tenant_fallback() {
        let f = fixture();
        f.provider.insert_user("u2", "x@a.kr", "pw").unwrap();
        seed(&f.access, "accounts/u2", json!({"role": "storeAdmin", "username": "x",
            "name": "X", "uid": "u2"})).await;
        seed(&f.access, "stores/B", json!({"name": "B", "managerEmail": "x@a.kr"})).await;
        f.resolver.staff_sessions().set_last_tenant("B").unwrap();
        f.provider.sign_in("x@a.kr", "pw").await.unwrap();

        let state = f.resolver.resolve().await;
        assert_eq!(state.tenant_id.as_deref(), Some("B"));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_stale_staff_session_is_cleared() {
        let f = fixture();
        let account: Account = serde_json::from_value(json!({"id": "gone", "role": "staff",
            "username": "kim", "name": "Kim", "uid": "gone", "storeId": "A"})).unwrap();
        f.resolver.staff_sessions().save(&account).unwrap();
        f.resolver.staff_sessions().set_last_tenant("A").unwrap();

        let state = f.resolver.resolve().await;
        assert!(!state.is_authenticated());
        assert!(f.resolver.staff_sessions().load().is_none());
        assert!(f.resolver.staff_sessions().last_tenant().is_none());
        assert!(f.storage.get(STAFF_SESSION_KEY).is_none());
    }

    /// Delays reads of one document so a resolution can be overtaken
    struct SlowStore {
        inner: MemoryStore,
        slow_id: &'static str,
    }

    #[async_trait::async_trait]
    impl DocumentStore for SlowStore {
        async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
            if id == self.slow_id {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
            self.inner.get(collection, id).await
        }

        async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
            self.inner.query(collection, query).await
        }

        async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
            self.inner.commit(batch).await
        }

        fn changes(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
            self.inner.changes()
        }
    }

    #[tokio::test]
    async fn test_superseded_resolution_is_discarded() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let access = DocumentAccess::new(Arc::new(SlowStore {
            inner: MemoryStore::new(),
            slow_id: "ua",
        }));
        let sessions = Arc::new(StaffSessionStore::new(
            Arc::new(MemorySessionStorage::new()),
            "test-secret",
        ));
        let resolver = Arc::new(SessionResolver::new(provider.clone(), access.clone(), sessions));

        provider.insert_user("ua", "a@x.kr", "pw").unwrap();
        provider.insert_user("ub", "b@x.kr", "pw").unwrap();
        seed(&access, "accounts/ua", json!({"role": "superAdmin", "username": "a", "name": "A", "uid": "ua"})).await;
        seed(&access, "accounts/ub", json!({"role": "superAdmin", "username": "b", "name": "B", "uid": "ub"})).await;

        provider.sign_in("a@x.kr", "pw").await.unwrap();
        let slow = {
            let r = Arc::clone(&resolver);
            tokio::spawn(async move { r.resolve().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        provider.sign_in("b@x.kr", "pw").await.unwrap();
        let fast = resolver.resolve().await;
        let overtaken = slow.await.unwrap();

        assert_eq!(fast.account.as_ref().map(|a| a.id.as_str()), Some("ub"));
        assert_eq!(overtaken.account.as_ref().map(|a| a.id.as_str()), Some("ua"));
        let published = resolver.state();
        assert_eq!(published.account.as_ref().map(|a| a.id.as_str()), Some("ub"));
    }

    #[tokio::test]
    async fn test_overtaken_resolution_keeps_hands_off_session() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let access = DocumentAccess::new(Arc::new(SlowStore {
            inner: MemoryStore::new(),
            slow_id: "ua",
        }));
        let sessions = Arc::new(StaffSessionStore::new(
            Arc::new(MemorySessionStorage::new()),
            "test-secret",
        ));
        let resolver = Arc::new(SessionResolver::new(provider.clone(), access.clone(), sessions));

        provider.insert_user("ua", "a@x.kr", "pw").unwrap();
        seed(&access, "accounts/ua", json!({"role": "storeAdmin", "username": "a",
            "name": "A", "uid": "ua", "storeId": "A"})).await;
        seed(&access, "stores/A", json!({"name": "Store A", "managerEmail": "a@x.kr"})).await;

        provider.sign_in("a@x.kr", "pw").await.unwrap();
        let slow = {
            let r = Arc::clone(&resolver);
            tokio::spawn(async move { r.resolve().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Signing out overtakes the sign-in resolution still reading its account
        provider.sign_out().await.unwrap();
        let signed_out = resolver.resolve().await;
        assert!(!signed_out.is_authenticated());
        let overtaken = slow.await.unwrap();
        assert_eq!(overtaken.tenant_id.as_deref(), Some("A"));

        assert!(resolver.staff_sessions().last_tenant().is_none());
        assert!(!resolver.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_auth_listener_follows_sign_out() {
        let f = fixture();
        f.provider.insert_user("u9", "s@a.kr", "pw").unwrap();
        seed(&f.access, "accounts/u9", json!({"role": "superAdmin", "username": "s",
            "name": "S", "uid": "u9"})).await;
        let resolver = Arc::new(f.resolver);
        let mut rx = resolver.watch();
        let cancel = resolver.spawn_auth_listener();

        f.provider.sign_in("s@a.kr", "pw").await.unwrap();
        let signed_in = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                rx.changed().await.unwrap();
                if rx.borrow().is_authenticated() {
                    break;
                }
            }
        })
        .await;
        assert!(signed_in.is_ok());

        f.provider.sign_out().await.unwrap();
        let signed_out = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                rx.changed().await.unwrap();
                if !rx.borrow().is_authenticated() {
                    break;
                }
            }
        })
        .await;
        assert!(signed_out.is_ok());
        cancel.cancel();
    }
}
