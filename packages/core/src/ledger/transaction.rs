//! Payment transaction records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money earned by providing bandwidth
    Earning,
    /// Money spent consuming bandwidth
    Payment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Earning => "earning",
            TransactionKind::Payment => "payment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

/// Append-only ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub currency: String,
    pub status: TransactionStatus,
    pub connection_id: String,
    pub timestamp: DateTime<Utc>,
    /// Payment processor reference, set on confirmation
    pub processor_reference: Option<String>,
}

impl PaymentTransaction {
    /// A new transaction awaiting processor confirmation.
    pub fn pending(
        id: impl Into<String>,
        kind: TransactionKind,
        amount: f64,
        currency: impl Into<String>,
        connection_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            amount,
            currency: currency.into(),
            status: TransactionStatus::Pending,
            connection_id: connection_id.into(),
            timestamp,
            processor_reference: None,
        }
    }

    /// `Completed` and `Failed` transactions never change again.
    pub fn is_final(&self) -> bool {
        self.status != TransactionStatus::Pending
    }

    pub(crate) fn complete(&mut self, reference: Option<String>) -> Result<(), LedgerError> {
        if self.is_final() {
            return Err(LedgerError::transaction_finalized(&self.id));
        }
        self.status = TransactionStatus::Completed;
        if reference.is_some() {
            self.processor_reference = reference;
        }
        Ok(())
    }

    pub(crate) fn fail(&mut self) -> Result<(), LedgerError> {
        if self.is_final() {
            return Err(LedgerError::transaction_finalized(&self.id));
        }
        self.status = TransactionStatus::Failed;
        Ok(())
    }
}
