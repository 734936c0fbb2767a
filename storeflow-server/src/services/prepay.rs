//! Prepay Ledger Domain Service
//!
//! Balance and ledger are written together: every balance change commits in
//! one batch with its transaction row, guarded by a precondition on the
//! balance that was read. A lost race surfaces as `Conflict` and is retried
//! with a fresh read.
//!
//! Invariant: `customer.balance == Σ(charge) - Σ(deduct)` over its rows.
//!
//! Phone numbers are unique per store. The customer query decides whether a
//! number is taken; writers also swap a per-number claim document in the same
//! batch, so two registrations racing for one number cannot both commit.
//! Claims are never released. A claim left by a deleted or renumbered customer
//! is simply taken over.

use serde_json::{Map, Value, json};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    Feature, PrepayCustomer, PrepayCustomerCreate, PrepayCustomerUpdate, PrepayTransaction,
    PrepayTransactionInput, TransactionType, collections,
};
use shared::util::{new_id, now_millis};

use super::ServiceContext;
use crate::auth::Capability;
use crate::docstore::{Direction, Query, StoreResult, Subscription, WriteBatch, encode};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_NOTE_LEN, MAX_PREPAY_AMOUNT, MAX_SHORT_TEXT_LEN, validate_amount,
    validate_optional_text, validate_phone, validate_range, validate_required_text,
};

/// Attempts per charge/deduct before a `Conflict` is returned
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Ledger rows per history page
pub const HISTORY_LIMIT: usize = 100;

pub const OPENING_RECEIPT: &str = "신규 등록";
pub const OPENING_NOTE: &str = "신규 선결제 등록";
pub const MERGE_RECEIPT: &str = "고객 병합";

/// What to do when the phone number is already registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with `DuplicatePhone`; nothing is written
    Abort,
    /// Add the opening balance to the existing customer and take the new name
    Merge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Created(PrepayCustomer),
    Merged(PrepayCustomer),
}

impl Registration {
    pub fn customer(&self) -> &PrepayCustomer {
        match self {
            Registration::Created(c) | Registration::Merged(c) => c,
        }
    }
}

async fn find_by_phone(ctx: &ServiceContext, phone: &str) -> AppResult<Option<PrepayCustomer>> {
    let mut found: Vec<PrepayCustomer> = ctx
        .scope
        .query_as(collections::PREPAY_CUSTOMERS, Query::new().eq("phone", phone).limit(1))
        .await?;
    Ok(found.pop())
}

fn phone_claim_id(store_id: &str, phone: &str) -> String {
    format!("{store_id}_{phone}")
}

/// Add a compare-and-swap of the phone's claim to `batch`: the claim must be
/// unchanged since it was read here, and now points at `customer_id`.
async fn claim_phone(ctx: &ServiceContext, batch: WriteBatch, phone: &str, customer_id: &str) -> AppResult<WriteBatch> {
    let id = phone_claim_id(ctx.store_id(), phone);
    let batch = match ctx.scope.get(collections::PREPAY_PHONES, &id).await? {
        Some(claim) => {
            let holder = claim.get("customerId").cloned().unwrap_or(Value::Null);
            batch.expect(collections::PREPAY_PHONES, &id, "customerId", holder)
        }
        None => batch.expect_absent(collections::PREPAY_PHONES, &id),
    };
    let mut data = Map::new();
    data.insert("phone".into(), json!(phone));
    data.insert("customerId".into(), json!(customer_id));
    Ok(batch.set(collections::PREPAY_PHONES, &id, ctx.scope.stamp(data)))
}

fn duplicate_phone(existing: &PrepayCustomer) -> AppError {
    AppError::new(ErrorCode::DuplicatePhone)
        .with_detail("customerId", existing.id.clone())
        .with_detail("name", existing.name.clone())
        .with_detail("balance", existing.balance)
}

async fn load(ctx: &ServiceContext, id: &str) -> AppResult<PrepayCustomer> {
    ctx.scope
        .require(collections::PREPAY_CUSTOMERS, id, ErrorCode::PrepayCustomerNotFound)
        .await
}

fn ledger_row(
    ctx: &ServiceContext,
    customer_id: &str,
    kind: TransactionType,
    amount: i64,
    balance: i64,
    receipt_number: &str,
    notes: Option<String>,
) -> PrepayTransaction {
    PrepayTransaction {
        id: new_id(),
        store_id: ctx.store_id().to_string(),
        prepay_customer_id: customer_id.to_string(),
        kind,
        amount,
        balance,
        staff_id: ctx.actor_id().to_string(),
        staff_name: ctx.actor_name().to_string(),
        receipt_number: receipt_number.to_string(),
        notes,
        created_at: now_millis(),
    }
}

fn balance_patch(balance: i64, name: Option<&str>) -> Map<String, serde_json::Value> {
    let mut patch = Map::new();
    patch.insert("balance".into(), json!(balance));
    if let Some(name) = name {
        patch.insert("name".into(), json!(name));
    }
    patch
}

/// Register a customer. A positive opening balance gets its own `charge` row.
pub async fn register(
    ctx: &ServiceContext,
    input: PrepayCustomerCreate,
    policy: DuplicatePolicy,
) -> AppResult<Registration> {
    ctx.require(Capability::ChargePrepay)?;
    ctx.require_feature(Feature::Prepay)?;
    validate_required_text(&input.name, "name", MAX_NAME_LEN)?;
    let phone = validate_phone(&input.phone)?;
    validate_range(input.initial_balance, "initialBalance", 0, MAX_PREPAY_AMOUNT)?;
    let name = input.name.trim().to_string();

    for attempt in 1..=MAX_COMMIT_ATTEMPTS {
        if let Some(existing) = find_by_phone(ctx, &phone).await? {
            if policy == DuplicatePolicy::Abort {
                return Err(duplicate_phone(&existing));
            }
            return merge_into(ctx, existing, &name, input.initial_balance).await;
        }

        let now = now_millis();
        let customer = PrepayCustomer {
            id: new_id(),
            store_id: ctx.store_id().to_string(),
            name: name.clone(),
            phone: phone.clone(),
            balance: input.initial_balance,
            created_at: now,
            updated_at: now,
        };
        let mut batch = WriteBatch::new().set(
            collections::PREPAY_CUSTOMERS,
            &customer.id,
            ctx.scope.stamp(encode(&customer)?),
        );
        if customer.balance > 0 {
            let row = ledger_row(
                ctx,
                &customer.id,
                TransactionType::Charge,
                customer.balance,
                customer.balance,
                OPENING_RECEIPT,
                Some(OPENING_NOTE.to_string()),
            );
            batch = batch.set(collections::PREPAY_TRANSACTIONS, &row.id, ctx.scope.stamp(encode(&row)?));
        }
        let batch = claim_phone(ctx, batch, &phone, &customer.id).await?;

        match ctx.scope.commit(batch).await {
            Ok(()) => {
                tracing::info!(
                    store_id = %ctx.store_id(),
                    customer_id = %customer.id,
                    opening_balance = customer.balance,
                    "Prepay customer registered"
                );
                return Ok(Registration::Created(customer));
            }
            Err(e) if e.code == ErrorCode::Conflict && attempt < MAX_COMMIT_ATTEMPTS => {
                // Another writer claimed the number first; look again
                tracing::warn!(store_id = %ctx.store_id(), attempt, "Phone claimed concurrently, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Err(AppError::conflict("Phone number kept changing during registration"))
}

async fn merge_into(
    ctx: &ServiceContext,
    existing: PrepayCustomer,
    name: &str,
    amount: i64,
) -> AppResult<Registration> {
    let mut customer = existing;
    for attempt in 1..=MAX_COMMIT_ATTEMPTS {
        let balance = customer.balance + amount;
        let mut batch = WriteBatch::new()
            .expect(collections::PREPAY_CUSTOMERS, &customer.id, "balance", customer.balance)
            .update(collections::PREPAY_CUSTOMERS, &customer.id, balance_patch(balance, Some(name)));
        if amount > 0 {
            let row = ledger_row(ctx, &customer.id, TransactionType::Charge, amount, balance, MERGE_RECEIPT, None);
            batch = batch.set(collections::PREPAY_TRANSACTIONS, &row.id, ctx.scope.stamp(encode(&row)?));
        }
        match ctx.scope.commit(batch).await {
            Ok(()) => {
                tracing::info!(customer_id = %customer.id, added = amount, "Prepay customer merged");
                customer.balance = balance;
                customer.name = name.to_string();
                return Ok(Registration::Merged(customer));
            }
            Err(e) if e.code == ErrorCode::Conflict && attempt < MAX_COMMIT_ATTEMPTS => {
                tracing::warn!(customer_id = %customer.id, attempt, "Balance changed during merge, retrying");
                customer = load(ctx, &customer.id).await?;
            }
            Err(e) => return Err(e),
        }
    }
    Err(AppError::conflict("Balance kept changing during merge"))
}

/// Charge or deduct. Nothing is written when the amount is not positive or
/// the deduction would overdraw the balance.
pub async fn apply_transaction(ctx: &ServiceContext, input: PrepayTransactionInput) -> AppResult<PrepayTransaction> {
    ctx.require(match input.kind {
        TransactionType::Charge => Capability::ChargePrepay,
        TransactionType::Deduct => Capability::DeductPrepay,
    })?;
    ctx.require_feature(Feature::Prepay)?;
    validate_amount(input.amount)?;
    validate_optional_text(&input.notes, "notes", MAX_NOTE_LEN)?;
    if input.receipt_number.chars().count() > MAX_SHORT_TEXT_LEN {
        return Err(AppError::validation("receiptNumber is too long").with_detail("field", "receiptNumber"));
    }
    let notes = input.notes.filter(|n| !n.trim().is_empty());

    for attempt in 1..=MAX_COMMIT_ATTEMPTS {
        let customer = load(ctx, &input.customer_id).await?;
        let balance = input.kind.apply(customer.balance, input.amount);
        if balance < 0 {
            tracing::info!(
                customer_id = %customer.id,
                balance = customer.balance,
                amount = input.amount,
                "Deduction rejected, insufficient balance"
            );
            return Err(AppError::insufficient_balance(customer.balance, input.amount));
        }

        let row = ledger_row(
            ctx,
            &customer.id,
            input.kind,
            input.amount,
            balance,
            input.receipt_number.trim(),
            notes.clone(),
        );
        let batch = WriteBatch::new()
            .expect(collections::PREPAY_CUSTOMERS, &customer.id, "balance", customer.balance)
            .update(collections::PREPAY_CUSTOMERS, &customer.id, balance_patch(balance, None))
            .set(collections::PREPAY_TRANSACTIONS, &row.id, ctx.scope.stamp(encode(&row)?));

        match ctx.scope.commit(batch).await {
            Ok(()) => {
                tracing::info!(
                    store_id = %ctx.store_id(),
                    customer_id = %customer.id,
                    kind = ?input.kind,
                    amount = input.amount,
                    balance,
                    "Prepay transaction applied"
                );
                return Ok(row);
            }
            Err(e) if e.code == ErrorCode::Conflict && attempt < MAX_COMMIT_ATTEMPTS => {
                tracing::warn!(customer_id = %customer.id, attempt, "Balance changed concurrently, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Err(AppError::conflict("Balance kept changing, giving up"))
}

pub async fn charge(ctx: &ServiceContext, customer_id: &str, amount: i64, receipt_number: &str) -> AppResult<PrepayTransaction> {
    apply_transaction(
        ctx,
        PrepayTransactionInput {
            customer_id: customer_id.to_string(),
            kind: TransactionType::Charge,
            amount,
            receipt_number: receipt_number.to_string(),
            notes: None,
        },
    )
    .await
}

pub async fn deduct(ctx: &ServiceContext, customer_id: &str, amount: i64, receipt_number: &str) -> AppResult<PrepayTransaction> {
    apply_transaction(
        ctx,
        PrepayTransactionInput {
            customer_id: customer_id.to_string(),
            kind: TransactionType::Deduct,
            amount,
            receipt_number: receipt_number.to_string(),
            notes: None,
        },
    )
    .await
}

/// Edit name / phone. The balance only moves through the ledger.
pub async fn update_customer(ctx: &ServiceContext, id: &str, input: PrepayCustomerUpdate) -> AppResult<PrepayCustomer> {
    ctx.require(Capability::ChargePrepay)?;
    ctx.require_feature(Feature::Prepay)?;
    let mut customer = load(ctx, id).await?;
    let mut patch = Map::new();

    if let Some(name) = input.name {
        validate_required_text(&name, "name", MAX_NAME_LEN)?;
        customer.name = name.trim().to_string();
        patch.insert("name".into(), json!(customer.name));
    }
    let mut batch = WriteBatch::new();
    if let Some(phone) = input.phone {
        let phone = validate_phone(&phone)?;
        if phone != customer.phone {
            if let Some(other) = find_by_phone(ctx, &phone).await? {
                return Err(duplicate_phone(&other));
            }
            batch = claim_phone(ctx, batch, &phone, &customer.id).await?;
            customer.phone = phone;
            patch.insert("phone".into(), json!(customer.phone));
        }
    }
    if patch.is_empty() {
        return Ok(customer);
    }
    ctx.scope
        .commit(batch.update(collections::PREPAY_CUSTOMERS, id, patch))
        .await?;
    customer.updated_at = now_millis();
    Ok(customer)
}

/// Delete a customer together with its ledger rows
pub async fn delete_customer(ctx: &ServiceContext, id: &str) -> AppResult<usize> {
    ctx.require(Capability::ManageStore)?;
    ctx.require_feature(Feature::Prepay)?;
    let customer = load(ctx, id).await?;
    let rows = ctx
        .scope
        .query(collections::PREPAY_TRANSACTIONS, Query::new().eq("prepayCustomerId", id))
        .await?;

    let batch = rows
        .iter()
        .fold(WriteBatch::new(), |b, row| b.delete(collections::PREPAY_TRANSACTIONS, &row.id))
        .delete(collections::PREPAY_CUSTOMERS, &customer.id);
    ctx.scope.commit(batch).await?;

    tracing::info!(
        store_id = %ctx.store_id(),
        customer_id = id,
        removed_rows = rows.len(),
        "Prepay customer deleted"
    );
    Ok(rows.len())
}

fn customers_query() -> Query {
    Query::new().order_by("createdAt", Direction::Desc)
}

fn history_query(customer_id: &str) -> Query {
    Query::new()
        .eq("prepayCustomerId", customer_id)
        .order_by("createdAt", Direction::Desc)
        .limit(HISTORY_LIMIT)
}

pub async fn list_customers(ctx: &ServiceContext) -> AppResult<Vec<PrepayCustomer>> {
    ctx.require(Capability::ViewPrepay)?;
    ctx.require_feature(Feature::Prepay)?;
    ctx.scope.query_as(collections::PREPAY_CUSTOMERS, customers_query()).await
}

/// Latest ledger rows of one customer, newest first
pub async fn history(ctx: &ServiceContext, customer_id: &str) -> AppResult<Vec<PrepayTransaction>> {
    ctx.require(Capability::ViewPrepay)?;
    ctx.require_feature(Feature::Prepay)?;
    load(ctx, customer_id).await?;
    ctx.scope
        .query_as(collections::PREPAY_TRANSACTIONS, history_query(customer_id))
        .await
}

pub fn subscribe_customers<F>(ctx: &ServiceContext, on_change: F) -> AppResult<Subscription>
where
    F: FnMut(StoreResult<Vec<PrepayCustomer>>) + Send + 'static,
{
    ctx.require(Capability::ViewPrepay)?;
    ctx.require_feature(Feature::Prepay)?;
    Ok(ctx
        .scope
        .subscribe_as(collections::PREPAY_CUSTOMERS, customers_query(), on_change))
}

pub fn subscribe_history<F>(ctx: &ServiceContext, customer_id: &str, on_change: F) -> AppResult<Subscription>
where
    F: FnMut(StoreResult<Vec<PrepayTransaction>>) + Send + 'static,
{
    ctx.require(Capability::ViewPrepay)?;
    ctx.require_feature(Feature::Prepay)?;
    Ok(ctx
        .scope
        .subscribe_as(collections::PREPAY_TRANSACTIONS, history_query(customer_id), on_change))
}
