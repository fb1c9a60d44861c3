// models/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-facing status values. Once a transaction reaches a terminal
/// state it never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Successful,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Successful => "SUCCESSFUL",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Successful | TransactionStatus::Failed
        )
    }

    /// Unknown provider strings are treated as still-pending; the caller
    /// logs them.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "PENDING" => Some(TransactionStatus::Pending),
            "SUCCESSFUL" => Some(TransactionStatus::Successful),
            "FAILED" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub party_id_type: String,
    pub party_id: String,
}

impl Party {
    pub fn msisdn(number: impl Into<String>) -> Self {
        Party {
            party_id_type: "MSISDN".to_string(),
            party_id: number.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    // The caller-generated reference id sent to the provider; also the
    // idempotency key, so it doubles as the document id.
    #[serde(rename = "_id")]
    pub id: String,
    pub external_id: String,
    pub status: TransactionStatus,
    pub amount: String,
    pub currency: String,
    pub payer: Party,
    pub payer_message: String,
    pub payee_note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_provider_strings() {
        assert_eq!(
            TransactionStatus::from_provider("SUCCESSFUL"),
            Some(TransactionStatus::Successful)
        );
        assert_eq!(
            TransactionStatus::from_provider("FAILED"),
            Some(TransactionStatus::Failed)
        );
        assert_eq!(
            TransactionStatus::from_provider("PENDING"),
            Some(TransactionStatus::Pending)
        );
        assert_eq!(TransactionStatus::from_provider("ONGOING"), None);
    }

    #[test]
    fn only_successful_and_failed_are_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Successful.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_in_provider_case() {
        let json = serde_json::to_string(&TransactionStatus::Successful).unwrap();
        assert_eq!(json, "\"SUCCESSFUL\"");
    }
}
