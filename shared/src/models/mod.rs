//! Data models
//!
//! Shared between storeflow-server and the frontend (via API).
//! Wire names are camelCase; all timestamps are epoch millis (`i64`).
//! Document ids live outside the document body and are injected on read,
//! hence the `#[serde(default)] id` on every record type.

pub mod account;
pub mod hr;
pub mod prepay;
pub mod reservation;
pub mod store;

// Re-exports
pub use account::*;
pub use hr::*;
pub use prepay::*;
pub use reservation::*;
pub use store::*;

/// Collection names
pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    pub const STORES: &str = "stores";
    pub const RESERVATIONS: &str = "reservations";
    pub const PREPAY_CUSTOMERS: &str = "prepayCustomers";
    pub const PREPAY_TRANSACTIONS: &str = "prepayTransactions";
    /// Phone number claims, `{storeId}_{phone}` → customer id
    pub const PREPAY_PHONES: &str = "prepayPhones";
    pub const CONTRACTS: &str = "contracts";
    pub const TIMESHEETS: &str = "timesheets";
    pub const PAYROLL_RULES: &str = "payrollRules";
    pub const PAYROLLS: &str = "payrolls";

    /// Tenant-scoped collections included in a store backup
    pub const TENANT_SCOPED: [&str; 7] = [
        RESERVATIONS,
        PREPAY_CUSTOMERS,
        PREPAY_TRANSACTIONS,
        CONTRACTS,
        TIMESHEETS,
        PAYROLL_RULES,
        PAYROLLS,
    ];
}
