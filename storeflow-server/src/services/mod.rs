//! Domain services
//!
//! Every operation takes a [`ServiceContext`]: the acting account, its
//! capabilities and a [`TenantScope`] for the current store. Services check
//! capabilities and feature switches, validate input, then write through the
//! scope so tenant isolation never depends on the caller.

pub mod backup;
pub mod hr;
pub mod prepay;
pub mod reservation;
pub mod staff;
pub mod stores;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Account, Feature, Store, collections};

use crate::auth::{Capabilities, Capability, SessionState};
use crate::docstore::{DocumentAccess, TenantScope};

#[derive(Clone)]
pub struct ServiceContext {
    pub account: Account,
    pub caps: Capabilities,
    pub scope: TenantScope,
    pub store: Store,
}

impl ServiceContext {
    /// Context for the signed-in user's resolved store
    pub fn from_session(state: &SessionState, access: DocumentAccess) -> AppResult<Self> {
        let account = state.account.clone().ok_or_else(AppError::not_authenticated)?;
        let store = state
            .store
            .clone()
            .ok_or_else(|| AppError::new(ErrorCode::TenantNotSelected))?;
        Ok(Self::build(account, store, access))
    }

    /// Context for an explicit store. Store-bound accounts may only act on
    /// their own store; a super admin may act on any.
    pub async fn for_account(account: Account, store_id: &str, access: DocumentAccess) -> AppResult<Self> {
        let caps = Capabilities::derive(Some(&account));
        if !caps.can_access_super && account.store_id.as_deref() != Some(store_id) {
            return Err(AppError::new(ErrorCode::CrossTenantAccess).with_detail("storeId", store_id));
        }
        let store: Store = access
            .get_as(collections::STORES, store_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::TenantNotFound).with_detail("storeId", store_id))?;
        Ok(Self::build(account, store, access))
    }

    fn build(account: Account, store: Store, access: DocumentAccess) -> Self {
        Self {
            caps: Capabilities::derive(Some(&account)),
            scope: TenantScope::new(access, store.id.clone()),
            account,
            store,
        }
    }

    pub fn store_id(&self) -> &str {
        self.scope.store_id()
    }

    pub fn require(&self, capability: Capability) -> AppResult<()> {
        self.caps.require(capability)
    }

    pub fn require_feature(&self, feature: Feature) -> AppResult<()> {
        if self.store.is_feature_disabled(feature) {
            tracing::debug!(store_id = %self.store.id, feature = feature.as_str(), "Feature disabled");
            return Err(AppError::feature_disabled(feature.as_str()));
        }
        Ok(())
    }

    /// Identity stamped on audit fields
    pub fn actor_id(&self) -> &str {
        self.account.actor_id()
    }

    pub fn actor_name(&self) -> &str {
        self.account.display_name()
    }
}

/// Fields that must be unique before a create is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    StoreName,
    BusinessNumber,
    ManagerEmail,
    /// Staff username, unique per store
    StaffUsername,
}

impl UniqueField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueField::StoreName => "name",
            UniqueField::BusinessNumber => "businessNumber",
            UniqueField::ManagerEmail => "managerEmail",
            UniqueField::StaffUsername => "username",
        }
    }
}

/// Proof that a duplicate check passed for one exact value.
///
/// Only the check functions can mint one; submit paths take them as input
/// and refuse to write without a matching token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCheck {
    field: UniqueField,
    value: String,
    store_id: Option<String>,
}

impl DuplicateCheck {
    pub(crate) fn passed(field: UniqueField, value: &str, store_id: Option<&str>) -> Self {
        Self {
            field,
            value: value.trim().to_string(),
            store_id: store_id.map(str::to_string),
        }
    }

    pub fn field(&self) -> UniqueField {
        self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

pub(crate) fn require_check(
    checks: &[DuplicateCheck],
    field: UniqueField,
    value: &str,
    store_id: Option<&str>,
) -> AppResult<()> {
    let value = value.trim();
    let ok = checks
        .iter()
        .any(|c| c.field == field && c.value == value && c.store_id.as_deref() == store_id);
    if !ok {
        return Err(AppError::new(ErrorCode::DuplicateCheckRequired).with_detail("field", field.as_str()));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use serde_json::json;
    use shared::models::Role;

    #[tokio::test]
    async fn test_store_bound_account_cannot_switch_store() {
        let access = access();
        seed_store(&access, "A", json!({})).await;
        seed_store(&access, "B", json!({})).await;

        let staff = account("k", Role::Staff, Some("A"));
        let err = ServiceContext::for_account(staff, "B", access.clone())
            .await
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::CrossTenantAccess);

        let root = account("r", Role::SuperAdmin, None);
        let ctx = ServiceContext::for_account(root, "B", access).await.unwrap();
        assert_eq!(ctx.store_id(), "B");
    }

    #[tokio::test]
    async fn test_feature_switch() {
        let access = access();
        seed_store(&access, "A", json!({"hr": true, "reason": "unpaid"})).await;
        let ctx = context(&access, Role::StoreAdmin, "A").await;
        assert!(ctx.require_feature(Feature::Reservations).is_ok());
        let err = ctx.require_feature(Feature::Hr).unwrap_err();
        assert_eq!(err.code, ErrorCode::FeatureDisabled);
        assert_eq!(err.detail_str("feature"), Some("hr"));
    }

    #[test]
    fn test_duplicate_check_must_match_value_and_store() {
        let checks = vec![
            DuplicateCheck::passed(UniqueField::StoreName, " 강남점 ", None),
            DuplicateCheck::passed(UniqueField::StaffUsername, "kim", Some("A")),
        ];
        assert!(require_check(&checks, UniqueField::StoreName, "강남점", None).is_ok());
        let err = require_check(&checks, UniqueField::StoreName, "역삼점", None).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateCheckRequired);
        assert_eq!(err.detail_str("field"), Some("name"));
        assert!(require_check(&checks, UniqueField::BusinessNumber, "강남점", None).is_err());
        assert!(require_check(&checks, UniqueField::StaffUsername, "kim", Some("A")).is_ok());
        assert!(require_check(&checks, UniqueField::StaffUsername, "kim", Some("B")).is_err());
    }
}
