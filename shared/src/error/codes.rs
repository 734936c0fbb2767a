//! Unified error codes for storeflow
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Tenant (store) errors
//! - 4xxx: Reservation errors
//! - 5xxx: Prepay errors
//! - 6xxx: HR errors
//! - 7xxx: File errors
//! - 8xxx: Account errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Serialized as a bare u16 so the frontend can switch on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    Success = 0,
    Unknown = 1,
    ValidationFailed = 2,
    NotFound = 3,
    AlreadyExists = 4,
    InvalidRequest = 5,
    InvalidFormat = 6,
    RequiredField = 7,
    ValueOutOfRange = 8,
    /// Write raced with another writer and lost
    Conflict = 9,

    // ==================== 1xxx: Auth ====================
    NotAuthenticated = 1001,
    InvalidCredentials = 1002,
    TokenExpired = 1003,
    TokenInvalid = 1004,
    SessionExpired = 1005,
    /// Provider login succeeded but the account has the wrong role
    RoleMismatch = 1006,

    // ==================== 2xxx: Permission ====================
    PermissionDenied = 2001,
    RoleRequired = 2002,
    AdminRequired = 2003,
    CrossTenantAccess = 2004,

    // ==================== 3xxx: Tenant ====================
    TenantNotSelected = 3001,
    TenantNotFound = 3002,
    FeatureDisabled = 3003,
    StoreStatusLocked = 3004,
    StoreNameExists = 3005,
    BusinessNumberExists = 3006,
    ManagerEmailExists = 3007,
    DuplicateCheckRequired = 3008,
    InvalidBusinessNumber = 3009,

    // ==================== 4xxx: Reservation ====================
    ReservationNotFound = 4001,
    ReservationLocked = 4002,
    InvalidStatusTransition = 4003,

    // ==================== 5xxx: Prepay ====================
    PrepayCustomerNotFound = 5001,
    InsufficientBalance = 5002,
    InvalidAmount = 5003,
    DuplicatePhone = 5004,
    InvalidPhone = 5005,

    // ==================== 6xxx: HR ====================
    ContractNotFound = 6001,
    ContractLocked = 6002,
    TimesheetNotFound = 6101,
    TimesheetLocked = 6102,
    PayrollRuleNotFound = 6201,
    PayrollNotFound = 6202,

    // ==================== 7xxx: File ====================
    FileTooLarge = 7001,
    UnsupportedFileFormat = 7002,
    EmptyFile = 7003,
    FileStorageFailed = 7004,
    BackupInvalid = 7101,

    // ==================== 8xxx: Account ====================
    AccountNotFound = 8001,
    UsernameExists = 8002,
    EmailExists = 8003,

    // ==================== 9xxx: System ====================
    InternalError = 9001,
    DatabaseError = 9002,
    NetworkError = 9003,
    TimeoutError = 9004,
    ConfigError = 9005,
    MissingIndex = 9006,
    EmailSendFailed = 9101,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",
            ErrorCode::Conflict => "Concurrent modification, please retry",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidCredentials => "Invalid username or password",
            ErrorCode::TokenExpired => "Session token has expired",
            ErrorCode::TokenInvalid => "Session token is invalid",
            ErrorCode::SessionExpired => "Session has expired",
            ErrorCode::RoleMismatch => "Account role does not match this login",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Specific role is required",
            ErrorCode::AdminRequired => "Administrator role is required",
            ErrorCode::CrossTenantAccess => "Record belongs to another store",

            // Tenant
            ErrorCode::TenantNotSelected => "No store selected",
            ErrorCode::TenantNotFound => "Store not found",
            ErrorCode::FeatureDisabled => "Feature is disabled for this store",
            ErrorCode::StoreStatusLocked => "Active store status cannot be changed",
            ErrorCode::StoreNameExists => "Store name already exists",
            ErrorCode::BusinessNumberExists => "Business number already exists",
            ErrorCode::ManagerEmailExists => "Manager email already exists",
            ErrorCode::DuplicateCheckRequired => "Duplicate check has not passed",
            ErrorCode::InvalidBusinessNumber => "Business number must be NNN-NN-NNNNN",

            // Reservation
            ErrorCode::ReservationNotFound => "Reservation not found",
            ErrorCode::ReservationLocked => "Only a store admin can change a closed reservation",
            ErrorCode::InvalidStatusTransition => "Invalid reservation status transition",

            // Prepay
            ErrorCode::PrepayCustomerNotFound => "Prepay customer not found",
            ErrorCode::InsufficientBalance => "Insufficient balance",
            ErrorCode::InvalidAmount => "Amount must be greater than zero",
            ErrorCode::DuplicatePhone => "A customer with this phone number already exists",
            ErrorCode::InvalidPhone => "Invalid phone number",

            // HR
            ErrorCode::ContractNotFound => "Contract not found",
            ErrorCode::ContractLocked => "Signed contracts cannot be edited",
            ErrorCode::TimesheetNotFound => "Timesheet not found",
            ErrorCode::TimesheetLocked => "Processed timesheets cannot be edited",
            ErrorCode::PayrollRuleNotFound => "Payroll rule not found",
            ErrorCode::PayrollNotFound => "Payroll not found",

            // File
            ErrorCode::FileTooLarge => "File too large",
            ErrorCode::UnsupportedFileFormat => "Unsupported file format",
            ErrorCode::EmptyFile => "Empty file provided",
            ErrorCode::FileStorageFailed => "File storage failed",
            ErrorCode::BackupInvalid => "Backup archive is invalid",

            // Account
            ErrorCode::AccountNotFound => "Account not found",
            ErrorCode::UsernameExists => "Username already exists in this store",
            ErrorCode::EmailExists => "Email is already in use",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::MissingIndex => "Query requires a composite index",
            ErrorCode::EmailSendFailed => "Failed to send email",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            4 => ErrorCode::AlreadyExists,
            5 => ErrorCode::InvalidRequest,
            6 => ErrorCode::InvalidFormat,
            7 => ErrorCode::RequiredField,
            8 => ErrorCode::ValueOutOfRange,
            9 => ErrorCode::Conflict,

            1001 => ErrorCode::NotAuthenticated,
            1002 => ErrorCode::InvalidCredentials,
            1003 => ErrorCode::TokenExpired,
            1004 => ErrorCode::TokenInvalid,
            1005 => ErrorCode::SessionExpired,
            1006 => ErrorCode::RoleMismatch,

            2001 => ErrorCode::PermissionDenied,
            2002 => ErrorCode::RoleRequired,
            2003 => ErrorCode::AdminRequired,
            2004 => ErrorCode::CrossTenantAccess,

            3001 => ErrorCode::TenantNotSelected,
            3002 => ErrorCode::TenantNotFound,
            3003 => ErrorCode::FeatureDisabled,
            3004 => ErrorCode::StoreStatusLocked,
            3005 => ErrorCode::StoreNameExists,
            3006 => ErrorCode::BusinessNumberExists,
            3007 => ErrorCode::ManagerEmailExists,
            3008 => ErrorCode::DuplicateCheckRequired,
            3009 => ErrorCode::InvalidBusinessNumber,

            4001 => ErrorCode::ReservationNotFound,
            4002 => ErrorCode::ReservationLocked,
            4003 => ErrorCode::InvalidStatusTransition,

            5001 => ErrorCode::PrepayCustomerNotFound,
            5002 => ErrorCode::InsufficientBalance,
            5003 => ErrorCode::InvalidAmount,
            5004 => ErrorCode::DuplicatePhone,
            5005 => ErrorCode::InvalidPhone,

            6001 => ErrorCode::ContractNotFound,
            6002 => ErrorCode::ContractLocked,
            6101 => ErrorCode::TimesheetNotFound,
            6102 => ErrorCode::TimesheetLocked,
            6201 => ErrorCode::PayrollRuleNotFound,
            6202 => ErrorCode::PayrollNotFound,

            7001 => ErrorCode::FileTooLarge,
            7002 => ErrorCode::UnsupportedFileFormat,
            7003 => ErrorCode::EmptyFile,
            7004 => ErrorCode::FileStorageFailed,
            7101 => ErrorCode::BackupInvalid,

            8001 => ErrorCode::AccountNotFound,
            8002 => ErrorCode::UsernameExists,
            8003 => ErrorCode::EmailExists,

            9001 => ErrorCode::InternalError,
            9002 => ErrorCode::DatabaseError,
            9003 => ErrorCode::NetworkError,
            9004 => ErrorCode::TimeoutError,
            9005 => ErrorCode::ConfigError,
            9006 => ErrorCode::MissingIndex,
            9101 => ErrorCode::EmailSendFailed,

            _ => return Err(InvalidErrorCode(value)),
        };
        Ok(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::PermissionDenied.code(), 2001);
        assert_eq!(ErrorCode::TenantNotFound.code(), 3002);
        assert_eq!(ErrorCode::ReservationNotFound.code(), 4001);
        assert_eq!(ErrorCode::InsufficientBalance.code(), 5002);
        assert_eq!(ErrorCode::ContractLocked.code(), 6002);
        assert_eq!(ErrorCode::FileTooLarge.code(), 7001);
        assert_eq!(ErrorCode::UsernameExists.code(), 8002);
        assert_eq!(ErrorCode::MissingIndex.code(), 9006);
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::InsufficientBalance).unwrap();
        assert_eq!(json, "5002");
        let code: ErrorCode = serde_json::from_str("4002").unwrap();
        assert_eq!(code, ErrorCode::ReservationLocked);
    }

    #[test]
    fn test_deserialize_invalid() {
        let result: Result<ErrorCode, _> = serde_json::from_str("999");
        assert!(result.is_err());

        let result: Result<ErrorCode, _> = serde_json::from_str("10000");
        assert!(result.is_err());
    }

    #[test]
    fn test_every_code_maps_back() {
        for value in 0u16..10_000 {
            if let Ok(code) = ErrorCode::try_from(value) {
                assert_eq!(code.code(), value);
                assert!(!code.message().is_empty());
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorCode::Success), "0");
        assert_eq!(format!("{}", ErrorCode::InsufficientBalance), "5002");
    }

    #[test]
    fn test_invalid_error_code_display() {
        let err = InvalidErrorCode(999);
        assert_eq!(format!("{}", err), "invalid error code: 999");
    }
}
