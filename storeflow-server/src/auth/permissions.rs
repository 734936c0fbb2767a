//! Permission Definitions
//!
//! Capabilities are a pure function of the resolved account's role. Services
//! and route guards only ever look at [`Capabilities`], never at the role.
//!
//! | capability                                   | roles                    |
//! |----------------------------------------------|--------------------------|
//! | access_super, restore_backup                 | superAdmin               |
//! | manage_store, manage_staff, view_backup      | superAdmin, storeAdmin   |
//! | approve_hr, sign_contract, view_all_hr       | superAdmin, storeAdmin   |
//! | edit_reservations, charge/deduct_prepay      | any role                 |
//! | view_reservations, view_prepay, view_hr      | any resolved account     |

use serde::{Deserialize, Serialize};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Account, Role};

/// Single capability, for `require` checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    AccessSuper,
    ManageStore,
    ManageStaff,
    ViewBackup,
    RestoreBackup,
    EditReservations,
    ChargePrepay,
    DeductPrepay,
    ViewReservations,
    ViewPrepay,
    ViewHr,
    ViewAllHr,
    ApproveHr,
    SignContract,
    OverrideReservationStatus,
    AssignReservationStaff,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::AccessSuper => "canAccessSuper",
            Capability::ManageStore => "canManageStore",
            Capability::ManageStaff => "canManageStaff",
            Capability::ViewBackup => "canViewBackup",
            Capability::RestoreBackup => "canRestoreBackup",
            Capability::EditReservations => "canEditReservations",
            Capability::ChargePrepay => "canChargePrepay",
            Capability::DeductPrepay => "canDeductPrepay",
            Capability::ViewReservations => "canViewReservations",
            Capability::ViewPrepay => "canViewPrepay",
            Capability::ViewHr => "canViewHR",
            Capability::ViewAllHr => "canViewAllHR",
            Capability::ApproveHr => "canApproveHR",
            Capability::SignContract => "canSignContract",
            Capability::OverrideReservationStatus => "canOverrideReservationStatus",
            Capability::AssignReservationStaff => "canAssignReservationStaff",
        }
    }
}

/// Derived capability set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_access_super: bool,
    pub can_manage_store: bool,
    pub can_manage_staff: bool,
    pub can_view_backup: bool,
    pub can_restore_backup: bool,
    pub can_edit_reservations: bool,
    pub can_charge_prepay: bool,
    pub can_deduct_prepay: bool,
    pub can_view_reservations: bool,
    pub can_view_prepay: bool,
    #[serde(rename = "canViewHR")]
    pub can_view_hr: bool,
    /// HR records of every staff member, not only one's own
    #[serde(rename = "canViewAllHR")]
    pub can_view_all_hr: bool,
    #[serde(rename = "canApproveHR")]
    pub can_approve_hr: bool,
    pub can_sign_contract: bool,
    /// Move a reservation out of a terminal status
    pub can_override_reservation_status: bool,
    /// Pick the assigned staff member when booking
    pub can_assign_reservation_staff: bool,
}

impl Capabilities {
    /// No account → everything false
    pub fn derive(account: Option<&Account>) -> Self {
        match account {
            Some(account) => Self::for_role(account.role),
            None => Self::default(),
        }
    }

    pub fn for_role(role: Role) -> Self {
        let is_super = role == Role::SuperAdmin;
        let is_admin = role.is_admin();
        Self {
            can_access_super: is_super,
            can_manage_store: is_admin,
            can_manage_staff: is_admin,
            can_view_backup: is_admin,
            can_restore_backup: is_super,
            can_edit_reservations: true,
            can_charge_prepay: true,
            can_deduct_prepay: true,
            can_view_reservations: true,
            can_view_prepay: true,
            can_view_hr: true,
            can_view_all_hr: is_admin,
            can_approve_hr: is_admin,
            can_sign_contract: is_admin,
            can_override_reservation_status: is_admin,
            can_assign_reservation_staff: role != Role::Staff,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::AccessSuper => self.can_access_super,
            Capability::ManageStore => self.can_manage_store,
            Capability::ManageStaff => self.can_manage_staff,
            Capability::ViewBackup => self.can_view_backup,
            Capability::RestoreBackup => self.can_restore_backup,
            Capability::EditReservations => self.can_edit_reservations,
            Capability::ChargePrepay => self.can_charge_prepay,
            Capability::DeductPrepay => self.can_deduct_prepay,
            Capability::ViewReservations => self.can_view_reservations,
            Capability::ViewPrepay => self.can_view_prepay,
            Capability::ViewHr => self.can_view_hr,
            Capability::ViewAllHr => self.can_view_all_hr,
            Capability::ApproveHr => self.can_approve_hr,
            Capability::SignContract => self.can_sign_contract,
            Capability::OverrideReservationStatus => self.can_override_reservation_status,
            Capability::AssignReservationStaff => self.can_assign_reservation_staff,
        }
    }

    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::PermissionDenied)
                .with_detail("capability", capability.as_str()))
        }
    }
}
