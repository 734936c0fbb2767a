//! HR Domain Service (contracts, timesheets, payroll)
//!
//! Lock rules:
//! - a contract is editable until it is signed; signing needs `can_sign_contract`
//! - a timesheet is editable while pending; approve/reject needs `can_approve_hr`
//! - payroll moves `pending → approved → paid` and never back

use chrono::{Datelike, NaiveDate};
use serde_json::{Map, json};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    AdminSignature, Contract, ContractInput, ContractStatus, Feature, Payroll, PayrollRule,
    PayrollRuleInput, PayrollStatus, Timesheet, TimesheetInput, TimesheetStatus, collections,
};
use shared::util::{millis_to_date, month_bounds, now_millis};

use super::ServiceContext;
use crate::auth::Capability;
use crate::docstore::{Direction, FilterOp, Query, encode};
use crate::utils::validation::{MAX_NAME_LEN, validate_range, validate_required_text};

/// Upper bound for hourly wages (won)
const MAX_HOURLY_WAGE: i64 = 1_000_000;

// ========== Contracts ==========

fn validate_contract(input: &ContractInput) -> AppResult<()> {
    validate_required_text(&input.staff_id, "staffId", MAX_NAME_LEN)?;
    validate_required_text(&input.staff_name, "staffName", MAX_NAME_LEN)?;
    validate_required_text(&input.position, "position", MAX_NAME_LEN)?;
    validate_range(input.hourly_wage, "hourlyWage", 0, MAX_HOURLY_WAGE)?;
    if let Some(end) = input.end_date
        && end < input.start_date
    {
        return Err(AppError::validation("endDate is before startDate").with_detail("field", "endDate"));
    }
    Ok(())
}

async fn load_contract(ctx: &ServiceContext, id: &str) -> AppResult<Contract> {
    ctx.scope
        .require(collections::CONTRACTS, id, ErrorCode::ContractNotFound)
        .await
}

fn check_contract_unlocked(contract: &Contract) -> AppResult<()> {
    if contract.status == ContractStatus::Signed {
        return Err(AppError::new(ErrorCode::ContractLocked).with_detail("id", contract.id.clone()));
    }
    Ok(())
}

pub async fn create_contract(ctx: &ServiceContext, input: ContractInput) -> AppResult<Contract> {
    ctx.require(Capability::ManageStaff)?;
    ctx.require_feature(Feature::Hr)?;
    validate_contract(&input)?;

    let now = now_millis();
    let mut contract = Contract {
        id: String::new(),
        store_id: ctx.store_id().to_string(),
        staff_id: input.staff_id,
        staff_name: input.staff_name.trim().to_string(),
        position: input.position.trim().to_string(),
        start_date: input.start_date,
        end_date: input.end_date,
        hourly_wage: input.hourly_wage,
        status: ContractStatus::Pending,
        admin_signature: None,
        signed_at: None,
        created_at: now,
        updated_at: now,
    };
    contract.id = ctx.scope.create_as(collections::CONTRACTS, &contract).await?;
    tracing::info!(store_id = %ctx.store_id(), contract_id = %contract.id, "Contract created");
    Ok(contract)
}

pub async fn update_contract(ctx: &ServiceContext, id: &str, input: ContractInput) -> AppResult<Contract> {
    ctx.require(Capability::ManageStaff)?;
    ctx.require_feature(Feature::Hr)?;
    let mut contract = load_contract(ctx, id).await?;
    check_contract_unlocked(&contract)?;
    validate_contract(&input)?;

    contract.staff_id = input.staff_id;
    contract.staff_name = input.staff_name.trim().to_string();
    contract.position = input.position.trim().to_string();
    contract.start_date = input.start_date;
    contract.end_date = input.end_date;
    contract.hourly_wage = input.hourly_wage;

    let mut patch = encode(&contract)?;
    patch.insert("endDate".into(), json!(contract.end_date));
    ctx.scope.update(collections::CONTRACTS, id, patch).await?;
    contract.updated_at = now_millis();
    Ok(contract)
}

/// Sign a pending contract, stamping the signing admin
pub async fn sign_contract(ctx: &ServiceContext, id: &str) -> AppResult<Contract> {
    ctx.require(Capability::SignContract)?;
    ctx.require_feature(Feature::Hr)?;
    let mut contract = load_contract(ctx, id).await?;
    if contract.status != ContractStatus::Pending {
        return Err(AppError::new(ErrorCode::ContractLocked)
            .with_detail("id", id)
            .with_detail("status", json!(contract.status)));
    }

    let now = now_millis();
    let signature = AdminSignature {
        name: ctx.actor_name().to_string(),
        uid: ctx.actor_id().to_string(),
        signed_at: now,
    };
    let mut patch = Map::new();
    patch.insert("status".into(), json!(ContractStatus::Signed));
    patch.insert("adminSignature".into(), json!(signature));
    patch.insert("signedAt".into(), json!(now));
    ctx.scope.update(collections::CONTRACTS, id, patch).await?;

    tracing::info!(store_id = %ctx.store_id(), contract_id = id, signer = %signature.uid, "Contract signed");
    contract.status = ContractStatus::Signed;
    contract.admin_signature = Some(signature);
    contract.signed_at = Some(now);
    Ok(contract)
}

pub async fn delete_contract(ctx: &ServiceContext, id: &str) -> AppResult<()> {
    ctx.require(Capability::ManageStaff)?;
    ctx.require_feature(Feature::Hr)?;
    let contract = load_contract(ctx, id).await?;
    check_contract_unlocked(&contract)?;
    ctx.scope.delete(collections::CONTRACTS, id).await
}

/// Staff see their own contracts; admins see the whole store
pub async fn list_contracts(ctx: &ServiceContext) -> AppResult<Vec<Contract>> {
    ctx.require(Capability::ViewHr)?;
    ctx.require_feature(Feature::Hr)?;
    let mut query = Query::new().order_by("startDate", Direction::Desc);
    if !ctx.caps.can_view_all_hr {
        query = query.eq("staffId", ctx.account.id.as_str());
    }
    ctx.scope.query_as(collections::CONTRACTS, query).await
}

// ========== Timesheets ==========

fn validate_timesheet(input: &TimesheetInput) -> AppResult<()> {
    validate_required_text(&input.staff_id, "staffId", MAX_NAME_LEN)?;
    validate_required_text(&input.staff_name, "staffName", MAX_NAME_LEN)?;
    validate_range(input.break_duration, "breakDuration", 0.0, 24.0)?;
    validate_range(input.overtime, "overtime", 0.0, 24.0)?;
    if let (Some(clock_in), Some(clock_out)) = (input.clock_in, input.clock_out)
        && clock_out < clock_in
    {
        return Err(AppError::validation("clockOut is before clockIn").with_detail("field", "clockOut"));
    }
    Ok(())
}

/// Staff can only file timesheets for themselves
fn check_timesheet_owner(ctx: &ServiceContext, staff_id: &str) -> AppResult<()> {
    if !ctx.caps.can_manage_staff && staff_id != ctx.account.id {
        return Err(AppError::permission_denied("Timesheets can only be filed for yourself")
            .with_detail("staffId", staff_id));
    }
    Ok(())
}

async fn load_timesheet(ctx: &ServiceContext, id: &str) -> AppResult<Timesheet> {
    ctx.scope
        .require(collections::TIMESHEETS, id, ErrorCode::TimesheetNotFound)
        .await
}

pub async fn create_timesheet(ctx: &ServiceContext, input: TimesheetInput) -> AppResult<Timesheet> {
    ctx.require(Capability::ViewHr)?;
    ctx.require_feature(Feature::Hr)?;
    validate_timesheet(&input)?;
    check_timesheet_owner(ctx, &input.staff_id)?;

    let now = now_millis();
    let mut sheet = Timesheet {
        id: String::new(),
        store_id: ctx.store_id().to_string(),
        staff_id: input.staff_id,
        staff_name: input.staff_name.trim().to_string(),
        date: input.date,
        clock_in: input.clock_in,
        clock_out: input.clock_out,
        break_duration: input.break_duration,
        overtime: input.overtime,
        status: TimesheetStatus::Pending,
        approved_by: None,
        approved_at: None,
        created_at: now,
        updated_at: now,
    };
    sheet.id = ctx.scope.create_as(collections::TIMESHEETS, &sheet).await?;
    tracing::info!(store_id = %ctx.store_id(), timesheet_id = %sheet.id, "Timesheet created");
    Ok(sheet)
}

pub async fn update_timesheet(ctx: &ServiceContext, id: &str, input: TimesheetInput) -> AppResult<Timesheet> {
    ctx.require(Capability::ViewHr)?;
    ctx.require_feature(Feature::Hr)?;
    let mut sheet = load_timesheet(ctx, id).await?;
    if sheet.status != TimesheetStatus::Pending {
        return Err(AppError::new(ErrorCode::TimesheetLocked).with_detail("id", id));
    }
    check_timesheet_owner(ctx, &sheet.staff_id)?;
    validate_timesheet(&input)?;
    check_timesheet_owner(ctx, &input.staff_id)?;

    sheet.staff_id = input.staff_id;
    sheet.staff_name = input.staff_name.trim().to_string();
    sheet.date = input.date;
    sheet.clock_in = input.clock_in;
    sheet.clock_out = input.clock_out;
    sheet.break_duration = input.break_duration;
    sheet.overtime = input.overtime;

    let mut patch = encode(&sheet)?;
    patch.insert("clockIn".into(), json!(sheet.clock_in));
    patch.insert("clockOut".into(), json!(sheet.clock_out));
    ctx.scope.update(collections::TIMESHEETS, id, patch).await?;
    sheet.updated_at = now_millis();
    Ok(sheet)
}

/// Approve or reject a pending timesheet
pub async fn review_timesheet(ctx: &ServiceContext, id: &str, approve: bool) -> AppResult<Timesheet> {
    ctx.require(Capability::ApproveHr)?;
    ctx.require_feature(Feature::Hr)?;
    let mut sheet = load_timesheet(ctx, id).await?;
    if sheet.status != TimesheetStatus::Pending {
        return Err(AppError::new(ErrorCode::TimesheetLocked)
            .with_detail("id", id)
            .with_detail("status", json!(sheet.status)));
    }

    let status = if approve {
        TimesheetStatus::Approved
    } else {
        TimesheetStatus::Rejected
    };
    let now = now_millis();
    let mut patch = Map::new();
    patch.insert("status".into(), json!(status));
    patch.insert("approvedBy".into(), json!(ctx.actor_id()));
    patch.insert("approvedAt".into(), json!(now));
    ctx.scope.update(collections::TIMESHEETS, id, patch).await?;

    tracing::info!(store_id = %ctx.store_id(), timesheet_id = id, status = ?status, "Timesheet reviewed");
    sheet.status = status;
    sheet.approved_by = Some(ctx.actor_id().to_string());
    sheet.approved_at = Some(now);
    Ok(sheet)
}

pub async fn delete_timesheet(ctx: &ServiceContext, id: &str) -> AppResult<()> {
    ctx.require(Capability::ViewHr)?;
    ctx.require_feature(Feature::Hr)?;
    let sheet = load_timesheet(ctx, id).await?;
    if sheet.status == TimesheetStatus::Approved {
        return Err(AppError::new(ErrorCode::TimesheetLocked).with_detail("id", id));
    }
    check_timesheet_owner(ctx, &sheet.staff_id)?;
    ctx.scope.delete(collections::TIMESHEETS, id).await
}

/// Timesheets of one month (optionally one staff member), by date
pub async fn list_timesheets(ctx: &ServiceContext, month: NaiveDate, staff_id: Option<&str>) -> AppResult<Vec<Timesheet>> {
    ctx.require(Capability::ViewHr)?;
    ctx.require_feature(Feature::Hr)?;
    let (first, last) =
        month_bounds(month).ok_or_else(|| AppError::validation(format!("Invalid month for {month}")))?;
    let mut query = Query::new()
        .filter("date", FilterOp::Ge, first)
        .filter("date", FilterOp::Le, last)
        .order_by("date", Direction::Asc);

    let own = (!ctx.caps.can_view_all_hr).then_some(ctx.account.id.as_str());
    if let Some(staff_id) = own.or(staff_id) {
        query = query.eq("staffId", staff_id);
    }
    ctx.scope.query_as(collections::TIMESHEETS, query).await
}

// ========== Payroll rules ==========

fn validate_rule(input: &PayrollRuleInput) -> AppResult<()> {
    validate_required_text(&input.name, "name", MAX_NAME_LEN)?;
    validate_range(input.base_hourly_wage, "baseHourlyWage", 0, MAX_HOURLY_WAGE)?;
    validate_range(input.overtime_multiplier, "overtimeMultiplier", 1.0, 5.0)?;
    validate_range(input.tax_rate, "taxRate", 0.0, 1.0)?;
    validate_range(input.allowance, "allowance", 0, 100_000_000)?;
    Ok(())
}

pub async fn create_rule(ctx: &ServiceContext, input: PayrollRuleInput) -> AppResult<PayrollRule> {
    ctx.require(Capability::ManageStore)?;
    ctx.require_feature(Feature::Payroll)?;
    validate_rule(&input)?;
    let now = now_millis();
    let mut rule = PayrollRule {
        id: String::new(),
        store_id: ctx.store_id().to_string(),
        name: input.name.trim().to_string(),
        base_hourly_wage: input.base_hourly_wage,
        overtime_multiplier: input.overtime_multiplier,
        tax_rate: input.tax_rate,
        allowance: input.allowance,
        created_at: now,
        updated_at: now,
    };
    rule.id = ctx.scope.create_as(collections::PAYROLL_RULES, &rule).await?;
    Ok(rule)
}

pub async fn update_rule(ctx: &ServiceContext, id: &str, input: PayrollRuleInput) -> AppResult<PayrollRule> {
    ctx.require(Capability::ManageStore)?;
    ctx.require_feature(Feature::Payroll)?;
    validate_rule(&input)?;
    let mut rule: PayrollRule = ctx
        .scope
        .require(collections::PAYROLL_RULES, id, ErrorCode::PayrollRuleNotFound)
        .await?;
    rule.name = input.name.trim().to_string();
    rule.base_hourly_wage = input.base_hourly_wage;
    rule.overtime_multiplier = input.overtime_multiplier;
    rule.tax_rate = input.tax_rate;
    rule.allowance = input.allowance;
    ctx.scope
        .update(collections::PAYROLL_RULES, id, encode(&rule)?)
        .await?;
    rule.updated_at = now_millis();
    Ok(rule)
}

pub async fn delete_rule(ctx: &ServiceContext, id: &str) -> AppResult<()> {
    ctx.require(Capability::ManageStore)?;
    ctx.require_feature(Feature::Payroll)?;
    ctx.scope
        .require::<PayrollRule>(collections::PAYROLL_RULES, id, ErrorCode::PayrollRuleNotFound)
        .await?;
    ctx.scope.delete(collections::PAYROLL_RULES, id).await
}

pub async fn list_rules(ctx: &ServiceContext) -> AppResult<Vec<PayrollRule>> {
    ctx.require(Capability::ViewHr)?;
    ctx.require_feature(Feature::Payroll)?;
    ctx.scope
        .query_as(collections::PAYROLL_RULES, Query::new().order_by("name", Direction::Asc))
        .await
}

// ========== Payroll ==========

/// Wage breakdown for one period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayrollAmounts {
    pub base_wage: i64,
    pub overtime_wage: i64,
    pub allowance: i64,
    pub tax: i64,
    pub total: i64,
}

/// ```text
/// base     = round(baseHours × wage)
/// overtime = round(overtimeHours × wage × multiplier)
/// gross    = base + overtime + allowance
/// tax      = round(gross × taxRate)
/// total    = gross - tax
/// ```
pub fn compute_amounts(rule: &PayrollRule, base_hours: f64, overtime_hours: f64) -> PayrollAmounts {
    let wage = rule.base_hourly_wage as f64;
    let base_wage = (base_hours * wage).round() as i64;
    let overtime_wage = (overtime_hours * wage * rule.overtime_multiplier).round() as i64;
    let gross = base_wage + overtime_wage + rule.allowance;
    let tax = (gross as f64 * rule.tax_rate).round() as i64;
    PayrollAmounts {
        base_wage,
        overtime_wage,
        allowance: rule.allowance,
        tax,
        total: gross - tax,
    }
}

/// Approved hours of one staff member in `month`: (base, overtime)
pub fn approved_hours(sheets: &[Timesheet], staff_id: &str, month: NaiveDate) -> (f64, f64) {
    sheets
        .iter()
        .filter(|s| s.staff_id == staff_id && s.status == TimesheetStatus::Approved)
        .filter(|s| {
            millis_to_date(s.date).is_some_and(|d| d.year() == month.year() && d.month() == month.month())
        })
        .fold((0.0, 0.0), |(base, overtime), s| {
            (base + s.worked_hours(), overtime + s.overtime)
        })
}

/// Compute and store a pending payroll for one staff member and month from
/// their approved timesheets
pub async fn calculate_payroll(
    ctx: &ServiceContext,
    staff_id: &str,
    month: NaiveDate,
    rule_id: &str,
) -> AppResult<Payroll> {
    ctx.require(Capability::ManageStore)?;
    ctx.require_feature(Feature::Payroll)?;
    let rule: PayrollRule = ctx
        .scope
        .require(collections::PAYROLL_RULES, rule_id, ErrorCode::PayrollRuleNotFound)
        .await?;
    let sheets = list_timesheets(ctx, month, Some(staff_id)).await?;
    let staff_name = sheets
        .first()
        .map(|s| s.staff_name.clone())
        .unwrap_or_else(|| staff_id.to_string());
    let (base_hours, overtime_hours) = approved_hours(&sheets, staff_id, month);
    let amounts = compute_amounts(&rule, base_hours, overtime_hours);

    let now = now_millis();
    let mut payroll = Payroll {
        id: String::new(),
        store_id: ctx.store_id().to_string(),
        staff_id: staff_id.to_string(),
        staff_name,
        period: format!("{:04}-{:02}", month.year(), month.month()),
        base_hours,
        overtime_hours,
        base_wage: amounts.base_wage,
        overtime_wage: amounts.overtime_wage,
        allowance: amounts.allowance,
        tax: amounts.tax,
        total: amounts.total,
        status: PayrollStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    payroll.id = ctx.scope.create_as(collections::PAYROLLS, &payroll).await?;
    tracing::info!(
        store_id = %ctx.store_id(),
        payroll_id = %payroll.id,
        period = %payroll.period,
        total = payroll.total,
        "Payroll calculated"
    );
    Ok(payroll)
}

/// Move a payroll one step along `pending → approved → paid`
pub async fn advance_payroll(ctx: &ServiceContext, id: &str) -> AppResult<Payroll> {
    ctx.require(Capability::ManageStore)?;
    ctx.require_feature(Feature::Payroll)?;
    let mut payroll: Payroll = ctx
        .scope
        .require(collections::PAYROLLS, id, ErrorCode::PayrollNotFound)
        .await?;
    let Some(next) = payroll.status.next() else {
        return Err(AppError::new(ErrorCode::InvalidStatusTransition)
            .with_detail("id", id)
            .with_detail("status", json!(payroll.status)));
    };
    let mut patch = Map::new();
    patch.insert("status".into(), json!(next));
    ctx.scope.update(collections::PAYROLLS, id, patch).await?;
    payroll.status = next;
    Ok(payroll)
}

pub async fn list_payrolls(ctx: &ServiceContext, period: Option<&str>) -> AppResult<Vec<Payroll>> {
    ctx.require(Capability::ViewHr)?;
    ctx.require_feature(Feature::Payroll)?;
    let mut query = Query::new().order_by("createdAt", Direction::Desc);
    if let Some(period) = period {
        query = query.eq("period", period);
    }
    if !ctx.caps.can_view_all_hr {
        query = query.eq("staffId", ctx.account.id.as_str());
    }
    ctx.scope.query_as(collections::PAYROLLS, query).await
}
