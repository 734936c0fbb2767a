//! Reservation Model

use serde::{Deserialize, Serialize};

/// Staff name shown while nobody is assigned (배정 중)
pub const UNASSIGNED_STAFF_NAME: &str = "배정 중";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::NoShow => "noShow",
        }
    }
}

/// Booking channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReservationSource {
    #[default]
    Phone,
    Naver,
}

/// Reservation document
///
/// `date` is the booking day at 00:00 (epoch millis), `start_time` the full
/// start instant. Both are stored so the calendar can range-query on `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    #[serde(default)]
    pub id: String,
    pub store_id: String,
    pub date: i64,
    pub start_time: i64,
    pub customer_name: String,
    pub phone: String,
    #[serde(default = "default_guest_count")]
    pub guest_count: u32,
    #[serde(default)]
    pub source: ReservationSource,
    #[serde(default)]
    pub staff_id: Option<String>,
    pub staff_name: String,
    pub created_by: String,
    pub created_by_name: String,
    #[serde(default)]
    pub status: ReservationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

fn default_guest_count() -> u32 {
    1
}

/// Reservation form input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationInput {
    /// Booking day as `YYYY-MM-DD`
    pub date: chrono::NaiveDate,
    pub hour: u32,
    pub minute: u32,
    pub customer_name: String,
    pub phone: String,
    #[serde(default)]
    pub guest_count: Option<u32>,
    #[serde(default)]
    pub source: ReservationSource,
    /// Only honoured for non-staff editors
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub staff_name: Option<String>,
    /// Only honoured on edit
    #[serde(default)]
    pub status: Option<ReservationStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Per-customer visit counts, keyed by phone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total: u32,
    pub completed: u32,
}
