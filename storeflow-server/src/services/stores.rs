//! Store administration (super admin)
//!
//! Stores are provisioned through [`StoreFunctions`] so the manager account
//! and onboarding mail are created in the same call. New stores start in
//! `initial`; the move to `active` is one-way and triggers the "store ready"
//! mail.

use std::sync::Arc;

use serde_json::{Map, json};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Account, DisabledFeatures, Store, StoreCreate, StoreStatus, StoreUpdate, collections};
use shared::util::now_millis;

use super::{DuplicateCheck, UniqueField, require_check};
use crate::auth::{Capabilities, Capability};
use crate::docstore::{Direction, DocumentAccess, Query, encode};
use crate::functions::{
    CreateStoreRequest, CreateStoreResponse, FunctionResult, PasswordSetupMailRequest,
    StoreCreationMailRequest, StoreFunctions,
};
use crate::storage::{ObjectStorage, sanitize_file_name, validate_logo};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_NOTE_LEN, MAX_URL_LEN, validate_business_number, validate_email,
    validate_optional_text, validate_required_text,
};

/// Result of the "store ready" mail that accompanies activation.
/// The store update itself has already been committed either way.
#[derive(Debug, Clone)]
pub enum CreationMail {
    NotNeeded,
    Sent,
    Failed(AppError),
}

#[derive(Debug, Clone)]
pub struct StoreChange {
    pub store: Store,
    pub creation_mail: CreationMail,
}

pub struct StoreAdmin {
    access: DocumentAccess,
    functions: Arc<dyn StoreFunctions>,
    storage: Arc<dyn ObjectStorage>,
}

impl StoreAdmin {
    /// Only a super admin gets a handle
    pub fn new(
        account: &Account,
        access: DocumentAccess,
        functions: Arc<dyn StoreFunctions>,
        storage: Arc<dyn ObjectStorage>,
    ) -> AppResult<Self> {
        Capabilities::derive(Some(account)).require(Capability::AccessSuper)?;
        Ok(Self {
            access,
            functions,
            storage,
        })
    }

    // ========== Duplicate checks ==========

    /// `Ok(token)` when no other store uses `value` for `field`.
    /// `editing` is the store being edited, which may keep its own value.
    async fn check_unique(
        &self,
        field: UniqueField,
        value: &str,
        editing: Option<&str>,
        taken: ErrorCode,
    ) -> AppResult<DuplicateCheck> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::required(field.as_str()));
        }
        let found = self
            .access
            .query(collections::STORES, &Query::new().eq(field.as_str(), value))
            .await?;
        if found.iter().any(|doc| Some(doc.id.as_str()) != editing) {
            return Err(AppError::new(taken).with_detail("value", value));
        }
        Ok(DuplicateCheck::passed(field, value, None))
    }

    pub async fn check_name(&self, name: &str, editing: Option<&str>) -> AppResult<DuplicateCheck> {
        self.check_unique(UniqueField::StoreName, name, editing, ErrorCode::StoreNameExists)
            .await
    }

    pub async fn check_business_number(&self, number: &str, editing: Option<&str>) -> AppResult<DuplicateCheck> {
        validate_business_number(number)?;
        self.check_unique(UniqueField::BusinessNumber, number, editing, ErrorCode::BusinessNumberExists)
            .await
    }

    pub async fn check_manager_email(&self, email: &str, editing: Option<&str>) -> AppResult<DuplicateCheck> {
        validate_email(email)?;
        self.check_unique(UniqueField::ManagerEmail, email, editing, ErrorCode::ManagerEmailExists)
            .await
    }

    // ========== Queries ==========

    pub async fn list(&self) -> AppResult<Vec<Store>> {
        let query = Query::new().order_by("createdAt", Direction::Desc);
        Ok(self.access.query_as(collections::STORES, &query).await?)
    }

    pub async fn get(&self, id: &str) -> AppResult<Store> {
        self.access
            .get_as(collections::STORES, id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::TenantNotFound).with_detail("storeId", id))
    }

    // ========== Mutations ==========

    /// Upload a logo ahead of create/update. Returns its URL.
    pub async fn upload_logo(&self, file_name: &str, bytes: Vec<u8>) -> AppResult<String> {
        let mime = validate_logo(file_name, &bytes)?;
        let key = format!("stores/logos/{}_{}", now_millis(), sanitize_file_name(file_name));
        let stored = self.storage.put(&key, bytes, &mime).await?;
        Ok(stored.url)
    }

    /// Provision a store. Every unique field needs a passing check token.
    pub async fn create(&self, input: StoreCreate, checks: &[DuplicateCheck]) -> AppResult<CreateStoreResponse> {
        validate_required_text(&input.name, "name", MAX_NAME_LEN)?;
        validate_business_number(&input.business_number)?;
        validate_email(&input.manager_email)?;
        validate_optional_text(&input.logo_url, "logoUrl", MAX_URL_LEN)?;

        require_check(checks, UniqueField::StoreName, &input.name, None)?;
        require_check(checks, UniqueField::BusinessNumber, &input.business_number, None)?;
        require_check(checks, UniqueField::ManagerEmail, &input.manager_email, None)?;

        let res = self
            .functions
            .create_store_with_account(CreateStoreRequest {
                store_name: input.name.trim().to_string(),
                manager_email: input.manager_email.trim().to_string(),
                business_number: Some(input.business_number.trim().to_string()),
                logo_url: input.logo_url,
            })
            .await?;
        tracing::info!(store_id = %res.store_id, "Store created");
        Ok(res)
    }

    /// Edit a store. Changed name or business number must still be unique.
    pub async fn update(&self, id: &str, input: StoreUpdate) -> AppResult<StoreChange> {
        let current = self.get(id).await?;
        let mut patch = Map::new();

        if let Some(name) = &input.name {
            validate_required_text(name, "name", MAX_NAME_LEN)?;
            if name.trim() != current.name {
                self.check_name(name, Some(id)).await?;
            }
            patch.insert("name".into(), json!(name.trim()));
        }
        if let Some(number) = &input.business_number {
            if number.trim() != current.business_number {
                self.check_business_number(number, Some(id)).await?;
            }
            patch.insert("businessNumber".into(), json!(number.trim()));
        }
        if let Some(logo_url) = &input.logo_url {
            validate_optional_text(&input.logo_url, "logoUrl", MAX_URL_LEN)?;
            patch.insert("logoUrl".into(), json!(logo_url));
        }
        if let Some(flags) = input.disabled_features {
            patch.insert("disabledFeatures".into(), self.features_value(flags)?);
        }
        let next_status = input.status.unwrap_or(current.status);
        if !current.status.can_transition_to(next_status) {
            return Err(AppError::new(ErrorCode::StoreStatusLocked).with_detail("storeId", id));
        }
        patch.insert("status".into(), json!(next_status));

        self.access.update(collections::STORES, id, patch).await?;
        let store = self.get(id).await?;
        tracing::info!(store_id = %id, status = ?store.status, "Store updated");

        let creation_mail = if current.status == StoreStatus::Initial && next_status == StoreStatus::Active {
            self.send_creation_mail(&store).await
        } else {
            CreationMail::NotNeeded
        };
        Ok(StoreChange { store, creation_mail })
    }

    /// Status control: only an `initial` store may change status. An active
    /// store is rejected before anything is written.
    pub async fn set_status(&self, id: &str, status: StoreStatus) -> AppResult<StoreChange> {
        let current = self.get(id).await?;
        if current.status != StoreStatus::Initial {
            return Err(AppError::new(ErrorCode::StoreStatusLocked).with_detail("storeId", id));
        }
        self.update(
            id,
            StoreUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Replace the feature switches. The reason is dropped once nothing is
    /// disabled.
    pub async fn set_features(&self, id: &str, flags: DisabledFeatures) -> AppResult<Store> {
        self.get(id).await?;
        let mut patch = Map::new();
        patch.insert("disabledFeatures".into(), self.features_value(flags)?);
        self.access.update(collections::STORES, id, patch).await?;
        let store = self.get(id).await?;
        tracing::info!(
            store_id = %id,
            disabled = ?store.disabled_features,
            "Store features updated"
        );
        Ok(store)
    }

    fn features_value(&self, flags: DisabledFeatures) -> AppResult<serde_json::Value> {
        let flags = flags.normalized();
        validate_reason(&flags.reason)?;
        Ok(serde_json::Value::Object(encode(&flags)?))
    }

    /// Remove the store document. Tenant data stays until restored over or
    /// cleaned up separately.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.get(id).await?;
        self.access.delete(collections::STORES, id).await?;
        tracing::info!(store_id = %id, "Store deleted");
        Ok(())
    }

    pub async fn resend_password_setup_email(&self, id: &str) -> AppResult<FunctionResult> {
        let store = self.get(id).await?;
        self.functions
            .resend_password_setup_email(PasswordSetupMailRequest {
                store_id: store.id,
                store_name: store.name,
                manager_email: store.manager_email,
            })
            .await
    }

    async fn send_creation_mail(&self, store: &Store) -> CreationMail {
        let req = StoreCreationMailRequest {
            store_name: store.name.clone(),
            manager_email: store.manager_email.clone(),
            business_number: Some(store.business_number.clone()).filter(|b| !b.is_empty()),
        };
        match self.functions.send_store_creation_email(req).await {
            Ok(_) => CreationMail::Sent,
            Err(e) => {
                tracing::warn!(store_id = %store.id, error = %e, "Store is active but the creation mail failed");
                CreationMail::Failed(e)
            }
        }
    }
}

fn validate_reason(reason: &str) -> AppResult<()> {
    validate_optional_text(&Some(reason.to_string()), "reason", MAX_NOTE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryIdentityProvider;
    use crate::docstore::MemoryStore;
    use crate::functions::{FunctionsService, RecordingMailer};
    use crate::services::testing::account;
    use crate::storage::LocalStorage;
    use shared::models::{Feature, Role};

    struct Fixture {
        admin: StoreAdmin,
        mailer: Arc<RecordingMailer>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let access = DocumentAccess::new(Arc::new(MemoryStore::new()));
        let mailer = Arc::new(RecordingMailer::new());
        let functions = Arc::new(FunctionsService::new(
            Arc::new(MemoryIdentityProvider::new()),
            access.clone(),
            mailer.clone(),
            "https://app.storeflow.kr",
            "setup-secret",
        ));
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path(), "http://files"));
        let root = account("root", Role::SuperAdmin, None);
        let admin = StoreAdmin::new(&root, access, functions, storage).unwrap();
        Fixture {
            admin,
            mailer,
            _dir: dir,
        }
    }

    fn input(name: &str, number: &str, email: &str) -> StoreCreate {
        StoreCreate {
            name: name.into(),
            business_number: number.into(),
            manager_email: email.into(),
            logo_url: None,
        }
    }

    async fn create_checked(admin: &StoreAdmin, input: StoreCreate) -> AppResult<CreateStoreResponse> {
        let checks = vec![
            admin.check_name(&input.name, None).await?,
            admin.check_business_number(&input.business_number, None).await?,
            admin.check_manager_email(&input.manager_email, None).await?,
        ];
        admin.create(input, &checks).await
    }

    #[test]
    fn test_only_super_admin_gets_handle() {
        let access = DocumentAccess::new(Arc::new(MemoryStore::new()));
        let dir = tempfile::tempdir().unwrap();
        let functions = Arc::new(FunctionsService::new(
            Arc::new(MemoryIdentityProvider::new()),
            access.clone(),
            Arc::new(RecordingMailer::new()),
            "http://app",
            "s",
        ));
        let manager = account("m", Role::StoreAdmin, Some("A"));
        let err = StoreAdmin::new(
            &manager,
            access,
            functions,
            Arc::new(LocalStorage::new(dir.path(), "http://files")),
        )
        .err()
        .unwrap();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn test_create_requires_passing_checks() {
        let fx = fixture();
        let store = input("강남점", "123-45-67890", "boss@store.kr");

        let err = fx.admin.create(store.clone(), &[]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateCheckRequired);

        let name_only = vec![fx.admin.check_name("강남점", None).await.unwrap()];
        let err = fx.admin.create(store.clone(), &name_only).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateCheckRequired);
        assert_eq!(err.detail_str("field"), Some("businessNumber"));

        let res = create_checked(&fx.admin, store).await.unwrap();
        let created = fx.admin.get(&res.store_id).await.unwrap();
        assert_eq!(created.status, StoreStatus::Initial);
        assert_eq!(created.business_number, "123-45-67890");
    }

    #[tokio::test]
    async fn test_duplicates_detected() {
        let fx = fixture();
        let res = create_checked(&fx.admin, input("강남점", "123-45-67890", "boss@store.kr"))
            .await
            .unwrap();

        let err = fx.admin.check_name("강남점", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StoreNameExists);
        let err = fx.admin.check_business_number("123-45-67890", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessNumberExists);
        let err = fx.admin.check_manager_email("boss@store.kr", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ManagerEmailExists);

        // The store being edited may keep its own values
        assert!(fx.admin.check_name("강남점", Some(&res.store_id)).await.is_ok());

        let err = fx.admin.check_business_number("12345", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidBusinessNumber);
    }

    #[tokio::test]
    async fn test_activation_is_one_way_and_mails_once() {
        let fx = fixture();
        let res = create_checked(&fx.admin, input("강남점", "123-45-67890", "boss@store.kr"))
            .await
            .unwrap();
        assert_eq!(fx.mailer.sent().len(), 1);

        let change = fx.admin.set_status(&res.store_id, StoreStatus::Active).await.unwrap();
        assert_eq!(change.store.status, StoreStatus::Active);
        assert!(matches!(change.creation_mail, CreationMail::Sent));
        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "[storeFlow] 강남점 매장 생성 완료 안내");

        let before = fx.admin.get(&res.store_id).await.unwrap();
        let err = fx.admin.set_status(&res.store_id, StoreStatus::Active).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StoreStatusLocked);
        assert_eq!(fx.admin.get(&res.store_id).await.unwrap().updated_at, before.updated_at);

        // A plain edit keeps the status and does not mail again
        let change = fx
            .admin
            .update(
                &res.store_id,
                StoreUpdate {
                    name: Some("강남본점".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(change.creation_mail, CreationMail::NotNeeded));

        let err = fx
            .admin
            .set_status(&res.store_id, StoreStatus::Initial)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::StoreStatusLocked);
        assert_eq!(fx.mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_activation_survives_mail_failure() {
        let fx = fixture();
        let res = create_checked(&fx.admin, input("강남점", "123-45-67890", "boss@store.kr"))
            .await
            .unwrap();
        fx.mailer.set_failing(true);
        let change = fx.admin.set_status(&res.store_id, StoreStatus::Active).await.unwrap();
        assert!(matches!(change.creation_mail, CreationMail::Failed(_)));
        assert_eq!(fx.admin.get(&res.store_id).await.unwrap().status, StoreStatus::Active);
    }

    #[tokio::test]
    async fn test_feature_reason_cleared() {
        let fx = fixture();
        let res = create_checked(&fx.admin, input("강남점", "123-45-67890", "boss@store.kr"))
            .await
            .unwrap();

        let mut flags = DisabledFeatures {
            reason: "미납".into(),
            reason_type: "payment".into(),
            ..Default::default()
        };
        flags.set(Feature::Hr, true);
        let store = fx.admin.set_features(&res.store_id, flags).await.unwrap();
        assert!(store.is_feature_disabled(Feature::Hr));
        assert_eq!(store.disabled_features.reason, "미납");

        let cleared = DisabledFeatures {
            reason: "stale".into(),
            ..Default::default()
        };
        let store = fx.admin.set_features(&res.store_id, cleared).await.unwrap();
        assert!(!store.disabled_features.any_disabled());
        assert!(store.disabled_features.reason.is_empty());
    }

    #[tokio::test]
    async fn test_upload_logo_and_delete() {
        let fx = fixture();
        let url = fx.admin.upload_logo("로고.png", vec![1, 2, 3]).await.unwrap();
        assert!(url.starts_with("http://files/stores/logos/"));
        assert!(url.ends_with("_로고.png"));
        let err = fx.admin.upload_logo("logo.gif.exe", vec![1]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedFileFormat);

        let res = create_checked(&fx.admin, input("강남점", "123-45-67890", "boss@store.kr"))
            .await
            .unwrap();
        fx.admin.delete(&res.store_id).await.unwrap();
        let err = fx.admin.get(&res.store_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TenantNotFound);
        assert!(fx.admin.list().await.unwrap().is_empty());
    }
}
