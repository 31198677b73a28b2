//! Error types for ledger operations

use thiserror::Error;

use crate::ledger::types::ConnectionStatus;
use crate::pricing::PricingError;
use crate::services::payments::ProcessorError;
use crate::settings::{NetworkType, SettingsError};

/// Errors that can occur while mutating connections or the transaction ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Withdrawal of {available:.2} is below the minimum of {minimum:.2}")]
    BelowMinimum { available: f64, minimum: f64 },

    #[error("Unknown connection: {id}")]
    UnknownConnection { id: String },

    #[error("Unknown network node: {id}")]
    UnknownNode { id: String },

    #[error("Network node {id} is not available")]
    NodeUnavailable { id: String },

    #[error("Unknown transaction: {id}")]
    UnknownTransaction { id: String },

    #[error("Connection {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    #[error("Transaction {id} is already finalized")]
    TransactionFinalized { id: String },

    #[error("Connection limit of {max} reached")]
    ConnectionLimit { max: u32 },

    #[error("Sharing is disabled")]
    SharingDisabled,

    #[error("Sharing is not allowed on {network}")]
    NetworkNotAllowed { network: NetworkType },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

impl LedgerError {
    pub fn unknown_connection(id: impl Into<String>) -> Self {
        Self::UnknownConnection { id: id.into() }
    }

    pub fn unknown_node(id: impl Into<String>) -> Self {
        Self::UnknownNode { id: id.into() }
    }

    pub fn unknown_transaction(id: impl Into<String>) -> Self {
        Self::UnknownTransaction { id: id.into() }
    }

    pub fn transaction_finalized(id: impl Into<String>) -> Self {
        Self::TransactionFinalized { id: id.into() }
    }
}
