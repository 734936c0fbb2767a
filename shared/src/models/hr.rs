//! HR Models (contracts, timesheets, payroll)

use serde::{Deserialize, Serialize};

// ========== Contract ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractStatus {
    #[default]
    Pending,
    Signed,
    Expired,
}

/// Admin signature stamped when a contract is signed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSignature {
    pub name: String,
    pub uid: String,
    pub signed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub id: String,
    pub store_id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub position: String,
    pub start_date: i64,
    #[serde(default)]
    pub end_date: Option<i64>,
    pub hourly_wage: i64,
    #[serde(default)]
    pub status: ContractStatus,
    #[serde(default)]
    pub admin_signature: Option<AdminSignature>,
    #[serde(default)]
    pub signed_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInput {
    pub staff_id: String,
    pub staff_name: String,
    pub position: String,
    pub start_date: i64,
    #[serde(default)]
    pub end_date: Option<i64>,
    pub hourly_wage: i64,
}

// ========== Timesheet ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimesheetStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
    #[serde(default)]
    pub id: String,
    pub store_id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub date: i64,
    #[serde(default)]
    pub clock_in: Option<i64>,
    #[serde(default)]
    pub clock_out: Option<i64>,
    /// Break length in hours
    #[serde(default)]
    pub break_duration: f64,
    /// Overtime in hours
    #[serde(default)]
    pub overtime: f64,
    #[serde(default)]
    pub status: TimesheetStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Timesheet {
    /// Worked hours, `max(0, (out - in) - break)`; zero while clocked in
    pub fn worked_hours(&self) -> f64 {
        match (self.clock_in, self.clock_out) {
            (Some(start), Some(end)) => {
                let span = (end - start) as f64 / 3_600_000.0;
                (span - self.break_duration).max(0.0)
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetInput {
    pub staff_id: String,
    pub staff_name: String,
    pub date: i64,
    #[serde(default)]
    pub clock_in: Option<i64>,
    #[serde(default)]
    pub clock_out: Option<i64>,
    #[serde(default)]
    pub break_duration: f64,
    #[serde(default)]
    pub overtime: f64,
}

// ========== Payroll ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRule {
    #[serde(default)]
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub base_hourly_wage: i64,
    #[serde(default = "default_overtime_multiplier")]
    pub overtime_multiplier: f64,
    /// Fraction in `0.0..=1.0`
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub allowance: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

pub fn default_overtime_multiplier() -> f64 {
    1.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRuleInput {
    pub name: String,
    pub base_hourly_wage: i64,
    #[serde(default = "default_overtime_multiplier")]
    pub overtime_multiplier: f64,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub allowance: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayrollStatus {
    #[default]
    Pending,
    Approved,
    Paid,
}

impl PayrollStatus {
    pub fn next(&self) -> Option<PayrollStatus> {
        match self {
            PayrollStatus::Pending => Some(PayrollStatus::Approved),
            PayrollStatus::Approved => Some(PayrollStatus::Paid),
            PayrollStatus::Paid => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payroll {
    #[serde(default)]
    pub id: String,
    pub store_id: String,
    pub staff_id: String,
    pub staff_name: String,
    /// `YYYY-MM`
    pub period: String,
    pub base_hours: f64,
    pub overtime_hours: f64,
    pub base_wage: i64,
    pub overtime_wage: i64,
    pub allowance: i64,
    pub tax: i64,
    pub total: i64,
    #[serde(default)]
    pub status: PayrollStatus,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(clock_in: Option<i64>, clock_out: Option<i64>, break_h: f64) -> Timesheet {
        Timesheet {
            id: String::new(),
            store_id: "s".into(),
            staff_id: "a".into(),
            staff_name: "A".into(),
            date: 0,
            clock_in,
            clock_out,
            break_duration: break_h,
            overtime: 0.0,
            status: TimesheetStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_worked_hours() {
        let h = 3_600_000;
        assert_eq!(sheet(Some(0), Some(8 * h), 1.0).worked_hours(), 7.0);
        assert_eq!(sheet(Some(0), Some(h / 2), 1.0).worked_hours(), 0.0);
        assert_eq!(sheet(Some(0), None, 0.0).worked_hours(), 0.0);
    }

    #[test]
    fn test_payroll_status_chain() {
        assert_eq!(PayrollStatus::Pending.next(), Some(PayrollStatus::Approved));
        assert_eq!(PayrollStatus::Approved.next(), Some(PayrollStatus::Paid));
        assert_eq!(PayrollStatus::Paid.next(), None);
    }

    #[test]
    fn test_rule_default_multiplier() {
        let rule: PayrollRuleInput =
            serde_json::from_str(r#"{"name":"basic","baseHourlyWage":10030}"#).unwrap();
        assert_eq!(rule.overtime_multiplier, 1.5);
    }
}
