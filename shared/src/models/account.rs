//! Account Model

use serde::{Deserialize, Serialize};

/// Account role
///
/// `superAdmin` operates across all stores; `storeAdmin` and `staff` are
/// bound to exactly one store through `Account::store_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    SuperAdmin,
    StoreAdmin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superAdmin",
            Role::StoreAdmin => "storeAdmin",
            Role::Staff => "staff",
        }
    }

    /// storeAdmin and staff accounts only make sense inside a store
    pub fn requires_tenant(&self) -> bool {
        matches!(self, Role::StoreAdmin | Role::Staff)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::StoreAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account document (`accounts/{id}`)
///
/// Admin accounts are keyed by the identity-provider uid. Staff accounts have
/// no provider credential and `uid == id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    pub username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Account {
    /// Identity recorded on ledger rows and reservations
    pub fn actor_id(&self) -> &str {
        self.uid.as_deref().unwrap_or(&self.id)
    }

    /// Display name for audit fields, falling back to username
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.username.is_empty() {
            &self.username
        } else {
            "알 수 없음"
        }
    }
}

/// Create staff account payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffAccountCreate {
    pub store_id: String,
    pub name: String,
    pub username: String,
}

/// Update account payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
}
