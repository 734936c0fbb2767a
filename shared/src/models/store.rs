//! Store (tenant) Model

use serde::{Deserialize, Serialize};

/// Store lifecycle status
///
/// `initial` → `active` only. The transition happens once, when the manager
/// finishes onboarding, and is the trigger for the "store ready" email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreStatus {
    #[default]
    Initial,
    Active,
}

impl StoreStatus {
    pub fn can_transition_to(&self, next: StoreStatus) -> bool {
        matches!(
            (self, next),
            (StoreStatus::Initial, _) | (StoreStatus::Active, StoreStatus::Active)
        )
    }
}

/// Toggleable store features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Reservations,
    Prepay,
    Hr,
    Payroll,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::Reservations,
        Feature::Prepay,
        Feature::Hr,
        Feature::Payroll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Reservations => "reservations",
            Feature::Prepay => "prepay",
            Feature::Hr => "hr",
            Feature::Payroll => "payroll",
        }
    }
}

/// Per-store feature switches, set by the super admin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisabledFeatures {
    #[serde(default)]
    pub reservations: bool,
    #[serde(default)]
    pub prepay: bool,
    #[serde(default)]
    pub hr: bool,
    #[serde(default)]
    pub payroll: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub reason_type: String,
}

impl DisabledFeatures {
    pub fn is_disabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Reservations => self.reservations,
            Feature::Prepay => self.prepay,
            Feature::Hr => self.hr,
            Feature::Payroll => self.payroll,
        }
    }

    pub fn set(&mut self, feature: Feature, disabled: bool) {
        match feature {
            Feature::Reservations => self.reservations = disabled,
            Feature::Prepay => self.prepay = disabled,
            Feature::Hr => self.hr = disabled,
            Feature::Payroll => self.payroll = disabled,
        }
    }

    pub fn any_disabled(&self) -> bool {
        Feature::ALL.iter().any(|f| self.is_disabled(*f))
    }

    /// Reason fields only survive while at least one feature is off.
    /// `reasonType` defaults to `custom`.
    pub fn normalized(mut self) -> Self {
        if self.any_disabled() {
            if self.reason_type.is_empty() {
                self.reason_type = "custom".to_string();
            }
        } else {
            self.reason.clear();
            self.reason_type.clear();
        }
        self
    }
}

/// Store document (`stores/{id}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub business_number: String,
    pub manager_email: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub status: StoreStatus,
    #[serde(default)]
    pub disabled_features: DisabledFeatures,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Store {
    pub fn is_feature_disabled(&self, feature: Feature) -> bool {
        self.disabled_features.is_disabled(feature)
    }
}

/// Create store payload (super admin)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCreate {
    pub name: String,
    pub business_number: String,
    pub manager_email: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Update store payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub business_number: Option<String>,
    pub logo_url: Option<String>,
    pub status: Option<StoreStatus>,
    pub disabled_features: Option<DisabledFeatures>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_moves_forward() {
        assert!(StoreStatus::Initial.can_transition_to(StoreStatus::Active));
        assert!(StoreStatus::Initial.can_transition_to(StoreStatus::Initial));
        assert!(StoreStatus::Active.can_transition_to(StoreStatus::Active));
        assert!(!StoreStatus::Active.can_transition_to(StoreStatus::Initial));
    }

    #[test]
    fn test_missing_disabled_features_means_enabled() {
        let json = r#"{"name":"A","managerEmail":"a@b.c"}"#;
        let store: Store = serde_json::from_str(json).unwrap();
        assert_eq!(store.status, StoreStatus::Initial);
        for f in Feature::ALL {
            assert!(!store.is_feature_disabled(f));
        }
    }

    #[test]
    fn test_reason_cleared_when_nothing_disabled() {
        let flags = DisabledFeatures {
            reason: "late payment".into(),
            reason_type: "payment".into(),
            ..Default::default()
        }
        .normalized();
        assert!(flags.reason.is_empty());
        assert!(flags.reason_type.is_empty());

        let mut flags = DisabledFeatures {
            reason: "trial".into(),
            ..Default::default()
        };
        flags.set(Feature::Payroll, true);
        let flags = flags.normalized();
        assert_eq!(flags.reason, "trial");
        assert_eq!(flags.reason_type, "custom");
    }
}
