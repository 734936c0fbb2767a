//! Staff account management
//!
//! Staff have no provider credential; they sign in by picking their store and
//! typing their username. Usernames are unique per store.

use serde_json::{Map, json};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Account, AccountUpdate, Role, StaffAccountCreate, collections};

use super::{DuplicateCheck, ServiceContext, UniqueField, require_check};
use crate::auth::Capability;
use crate::docstore::{Direction, Query};
use crate::functions::StoreFunctions;
use crate::utils::validation::{MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, validate_required_text};

async fn username_taken(ctx: &ServiceContext, username: &str, editing: Option<&str>) -> AppResult<bool> {
    let found = ctx
        .scope
        .query(
            collections::ACCOUNTS,
            Query::new()
                .eq("username", username)
                .eq("role", Role::Staff.as_str()),
        )
        .await?;
    Ok(found.iter().any(|doc| Some(doc.id.as_str()) != editing))
}

/// Username duplicate check within the current store
pub async fn check_username(ctx: &ServiceContext, username: &str, editing: Option<&str>) -> AppResult<DuplicateCheck> {
    ctx.require(Capability::ManageStaff)?;
    validate_required_text(username, "username", MAX_SHORT_TEXT_LEN)?;
    let username = username.trim();
    if username_taken(ctx, username, editing).await? {
        return Err(AppError::new(ErrorCode::UsernameExists).with_detail("username", username));
    }
    Ok(DuplicateCheck::passed(UniqueField::StaffUsername, username, Some(ctx.store_id())))
}

pub async fn list(ctx: &ServiceContext) -> AppResult<Vec<Account>> {
    ctx.require(Capability::ManageStaff)?;
    ctx.scope
        .query_as(
            collections::ACCOUNTS,
            Query::new()
                .eq("role", Role::Staff.as_str())
                .order_by("name", Direction::Asc),
        )
        .await
}

/// Create a staff account in the current store. Needs a passing username check.
pub async fn create(
    ctx: &ServiceContext,
    functions: &dyn StoreFunctions,
    name: &str,
    username: &str,
    checks: &[DuplicateCheck],
) -> AppResult<Account> {
    ctx.require(Capability::ManageStaff)?;
    validate_required_text(name, "name", MAX_NAME_LEN)?;
    validate_required_text(username, "username", MAX_SHORT_TEXT_LEN)?;
    require_check(checks, UniqueField::StaffUsername, username, Some(ctx.store_id()))?;

    let res = functions
        .create_staff_account(StaffAccountCreate {
            store_id: ctx.store_id().to_string(),
            name: name.trim().to_string(),
            username: username.trim().to_string(),
        })
        .await?;
    ctx.scope
        .require(collections::ACCOUNTS, &res.account_id, ErrorCode::AccountNotFound)
        .await
}

async fn load_staff(ctx: &ServiceContext, id: &str) -> AppResult<Account> {
    let account: Account = ctx
        .scope
        .require(collections::ACCOUNTS, id, ErrorCode::AccountNotFound)
        .await?;
    if account.role != Role::Staff {
        return Err(AppError::permission_denied("Only staff accounts are managed here").with_detail("accountId", id));
    }
    Ok(account)
}

pub async fn update(ctx: &ServiceContext, id: &str, input: AccountUpdate) -> AppResult<Account> {
    ctx.require(Capability::ManageStaff)?;
    let current = load_staff(ctx, id).await?;

    let mut patch = Map::new();
    if let Some(name) = &input.name {
        validate_required_text(name, "name", MAX_NAME_LEN)?;
        patch.insert("name".into(), json!(name.trim()));
    }
    if let Some(username) = &input.username {
        validate_required_text(username, "username", MAX_SHORT_TEXT_LEN)?;
        let username = username.trim();
        if username != current.username && username_taken(ctx, username, Some(id)).await? {
            return Err(AppError::new(ErrorCode::UsernameExists).with_detail("username", username));
        }
        patch.insert("username".into(), json!(username));
    }
    if patch.is_empty() {
        return Ok(current);
    }

    ctx.scope.update(collections::ACCOUNTS, id, patch).await?;
    tracing::info!(account_id = %id, store_id = %ctx.store_id(), "Staff account updated");
    load_staff(ctx, id).await
}

pub async fn delete(ctx: &ServiceContext, id: &str) -> AppResult<()> {
    ctx.require(Capability::ManageStaff)?;
    load_staff(ctx, id).await?;
    ctx.scope.delete(collections::ACCOUNTS, id).await?;
    tracing::info!(account_id = %id, store_id = %ctx.store_id(), "Staff account deleted");
    Ok(())
}

/// Settings page: the signed-in admin edits their own display name
pub async fn update_profile(ctx: &ServiceContext, name: &str) -> AppResult<()> {
    ctx.require(Capability::ManageStore)?;
    validate_required_text(name, "name", MAX_NAME_LEN)?;
    let mut patch = Map::new();
    patch.insert("name".into(), json!(name.trim()));
    ctx.scope
        .access()
        .update(collections::ACCOUNTS, &ctx.account.id, patch)
        .await?;
    tracing::info!(account_id = %ctx.account.id, "Profile updated");
    Ok(())
}
