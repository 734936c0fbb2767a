//! Login flows
//!
//! - staff: `(storeId, username)` lookup, no password, local session token
//! - storeAdmin / superAdmin: provider email+password, then role check

use std::sync::Arc;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Account, Role, Store, StoreStatus, collections};

use super::provider::IdentityProvider;
use super::session::{SessionResolver, SessionState};
use crate::docstore::{Direction, DocumentAccess, Query};

pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    access: DocumentAccess,
    resolver: Arc<SessionResolver>,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        access: DocumentAccess,
        resolver: Arc<SessionResolver>,
    ) -> Self {
        Self {
            provider,
            access,
            resolver,
        }
    }

    pub fn resolver(&self) -> &Arc<SessionResolver> {
        &self.resolver
    }

    /// Active stores for the staff login picker, by name
    pub async fn list_active_stores(&self) -> AppResult<Vec<Store>> {
        let query = Query::new()
            .eq("status", "active")
            .order_by("name", Direction::Asc);
        Ok(self.access.query_as(collections::STORES, &query).await?)
    }

    /// Staff login. The account's uid (or its own id) becomes the session
    /// subject; the store becomes the remembered tenant.
    pub async fn login_staff(&self, store_id: &str, username: &str) -> AppResult<SessionState> {
        let username = username.trim();
        if store_id.is_empty() {
            return Err(AppError::required("storeId"));
        }
        if username.is_empty() {
            return Err(AppError::required("username"));
        }

        let store: Option<Store> = self.access.get_as(collections::STORES, store_id).await?;
        match store {
            Some(s) if s.status == StoreStatus::Active => {}
            Some(_) => {
                return Err(AppError::with_message(
                    ErrorCode::TenantNotFound,
                    "Store is not open for staff login yet",
                ));
            }
            None => return Err(AppError::new(ErrorCode::TenantNotFound)),
        }

        let query = Query::new()
            .eq("storeId", store_id)
            .eq("username", username)
            .eq("role", Role::Staff.as_str())
            .limit(1);
        let mut found: Vec<Account> = self.access.query_as(collections::ACCOUNTS, &query).await?;
        let Some(mut account) = found.pop() else {
            tracing::info!(store_id = store_id, username = username, "Staff login rejected");
            return Err(AppError::with_message(
                ErrorCode::InvalidCredentials,
                "No staff account with this username in the store",
            ));
        };
        if account.uid.is_none() {
            account.uid = Some(account.id.clone());
        }

        // A provider session would shadow the staff session
        self.provider.sign_out().await?;
        let sessions = self.resolver.staff_sessions();
        sessions.save(&account)?;
        sessions.set_last_tenant(store_id)?;
        tracing::info!(account_id = %account.id, store_id = store_id, "Staff signed in");

        Ok(self.resolver.resolve().await)
    }

    pub async fn login_super_admin(&self, email: &str, password: &str) -> AppResult<SessionState> {
        let account = self.provider_login(email, password, Role::SuperAdmin).await?;
        tracing::info!(account_id = %account.id, "Super admin signed in");
        Ok(self.resolver.resolve().await)
    }

    /// Store admin login; the account must be bound to a store
    pub async fn login_store_admin(&self, email: &str, password: &str) -> AppResult<SessionState> {
        let account = self.provider_login(email, password, Role::StoreAdmin).await?;
        let Some(store_id) = account.store_id.clone() else {
            self.provider.sign_out().await?;
            return Err(AppError::new(ErrorCode::TenantNotSelected));
        };
        self.resolver.staff_sessions().set_last_tenant(&store_id)?;
        tracing::info!(account_id = %account.id, store_id = %store_id, "Store admin signed in");
        Ok(self.resolver.resolve().await)
    }

    async fn provider_login(&self, email: &str, password: &str, role: Role) -> AppResult<Account> {
        let user = self.provider.sign_in(email, password).await?;
        self.resolver.staff_sessions().clear()?;

        let account: Option<Account> = self.access.get_as(collections::ACCOUNTS, &user.uid).await?;
        match account {
            Some(account) if account.role == role => Ok(account),
            other => {
                self.provider.sign_out().await?;
                tracing::warn!(
                    uid = %user.uid,
                    expected = %role,
                    actual = ?other.map(|a| a.role),
                    "Provider login with wrong role"
                );
                Err(AppError::new(ErrorCode::RoleMismatch).with_detail("expected", role.as_str()))
            }
        }
    }

    /// Sign out of both identity paths and forget the last store
    pub async fn sign_out(&self) -> AppResult<SessionState> {
        self.provider.sign_out().await?;
        let sessions = self.resolver.staff_sessions();
        sessions.clear()?;
        sessions.clear_last_tenant()?;
        Ok(self.resolver.resolve().await)
    }
}
