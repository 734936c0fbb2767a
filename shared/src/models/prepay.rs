//! Prepay Models
//!
//! A prepay customer carries a running balance; every change to it is mirrored
//! by exactly one append-only transaction row holding the post-operation
//! balance.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepayCustomer {
    #[serde(default)]
    pub id: String,
    pub store_id: String,
    pub name: String,
    /// Digits only, unique per store
    pub phone: String,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    Charge,
    Deduct,
}

impl TransactionType {
    /// Signed balance delta for `amount`
    pub fn apply(&self, balance: i64, amount: i64) -> i64 {
        match self {
            TransactionType::Charge => balance + amount,
            TransactionType::Deduct => balance - amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepayTransaction {
    #[serde(default)]
    pub id: String,
    pub store_id: String,
    pub prepay_customer_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    /// Balance after this transaction
    pub balance: i64,
    pub staff_id: String,
    pub staff_name: String,
    #[serde(default)]
    pub receipt_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// Register customer payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepayCustomerCreate {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub initial_balance: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepayCustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Charge / deduct request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepayTransactionInput {
    pub customer_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    #[serde(default)]
    pub receipt_number: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_field_renamed() {
        let json = r#"{"storeId":"s","prepayCustomerId":"c","type":"deduct","amount":5,
            "balance":10,"staffId":"u","staffName":"Kim"}"#;
        let tx: PrepayTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, TransactionType::Deduct);
        let out = serde_json::to_value(&tx).unwrap();
        assert_eq!(out["type"], "deduct");
    }

    #[test]
    fn test_apply() {
        assert_eq!(TransactionType::Charge.apply(100, 50), 150);
        assert_eq!(TransactionType::Deduct.apply(100, 150), -50);
    }
}
