// database/transactions.rs
use async_trait::async_trait;
use chrono::Utc;
use mongodb::{bson::doc, Collection, Database};

use crate::errors::Result;
use crate::models::transaction::{Transaction, TransactionStatus};

/// Access contract for the payment ledger. `apply_status` is the single
/// update path and enforces the one-way PENDING → SUCCESSFUL/FAILED state
/// machine: terminal rows are never touched.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<Transaction>>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Transaction>>;
    async fn insert(&self, transaction: &Transaction) -> Result<()>;
    async fn apply_status(
        &self,
        id: &str,
        status: TransactionStatus,
        financial_transaction_id: Option<&str>,
        reason: Option<&str>,
    ) -> Result<()>;
}

pub struct MongoTransactionLedger {
    collection: Collection<Transaction>,
}

impl MongoTransactionLedger {
    pub fn new(db: &Database) -> Self {
        MongoTransactionLedger {
            collection: db.collection("momo_transactions"),
        }
    }
}

#[async_trait]
impl TransactionLedger for MongoTransactionLedger {
    async fn find(&self, id: &str) -> Result<Option<Transaction>> {
        let transaction = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(transaction)
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Transaction>> {
        let transaction = self
            .collection
            .find_one(doc! { "external_id": external_id })
            .await?;
        Ok(transaction)
    }

    async fn insert(&self, transaction: &Transaction) -> Result<()> {
        self.collection.insert_one(transaction).await?;
        Ok(())
    }

    async fn apply_status(
        &self,
        id: &str,
        status: TransactionStatus,
        financial_transaction_id: Option<&str>,
        reason: Option<&str>,
    ) -> Result<()> {
        // A PENDING report against any row is a no-op.
        if !status.is_terminal() {
            return Ok(());
        }

        let mut set = doc! {
            "status": status.as_str(),
            "updated_at": Utc::now().to_rfc3339(),
        };
        if let Some(ftid) = financial_transaction_id {
            set.insert("financial_transaction_id", ftid);
        }
        if let Some(reason) = reason {
            set.insert("reason", reason);
        }

        // Matching on the current PENDING status makes the transition
        // atomic: a row that already reached a terminal state is left alone.
        self.collection
            .update_one(
                doc! { "_id": id, "status": TransactionStatus::Pending.as_str() },
                doc! { "$set": set },
            )
            .await?;
        Ok(())
    }
}
