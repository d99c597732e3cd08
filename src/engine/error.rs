//! Error types for payout processing.

use thiserror::Error;

use crate::Amount;
use crate::model::{PayoutId, UserId};

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Wallet(UserId),
    Payout(PayoutId),
    Affiliate(UserId),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Wallet(user) => write!(f, "wallet for user {user}"),
            Missing::Payout(id) => write!(f, "payout request {id}"),
            Missing::Affiliate(user) => write!(f, "affiliate {user}"),
        }
    }
}

/// Top-level error returned by the engine operations.
#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("{0} not found")]
    NotFound(Missing),

    #[error("insufficient funds for user {user}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        user: UserId,
        balance: Amount,
        requested: Amount,
    },

    #[error("payout of {requested} is below the minimum of {minimum}")]
    BelowMinimum { minimum: Amount, requested: Amount },

    #[error("payout of {requested} exceeds the {available} not already pledged to pending requests")]
    OverPledged { available: Amount, requested: Amount },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("affiliate {0} is not approved for payouts")]
    AccountNotApproved(UserId),

    #[error("store unavailable: {0}")]
    TransientStore(String),
}

impl PayoutError {
    /// Stable code the presentation layer can map to a message.
    pub fn reason_code(&self) -> &'static str {
        match self {
            PayoutError::NotFound(_) => "not_found",
            PayoutError::InsufficientFunds { .. } => "insufficient_funds",
            PayoutError::BelowMinimum { .. } => "below_minimum",
            PayoutError::OverPledged { .. } => "over_pledged",
            PayoutError::Validation(_) => "validation_error",
            PayoutError::AccountNotApproved(_) => "account_not_approved",
            PayoutError::TransientStore(_) => "transient_store_error",
        }
    }
}

/// Wallet store failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("insufficient funds for user {0}: balance {1}, requested {2}")]
    InsufficientFunds(UserId, Amount, Amount),

    #[error("amount out of range for wallet of user {0}")]
    Overflow(UserId),
}

impl From<WalletError> for PayoutError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientFunds(user, balance, requested) => {
                PayoutError::InsufficientFunds {
                    user,
                    balance,
                    requested,
                }
            }
            WalletError::Overflow(user) => PayoutError::Validation(format!(
                "amount out of range for wallet of user {user}"
            )),
        }
    }
}

/// Audit trail storage failure.
#[derive(Debug, Error)]
#[error("status history unavailable: {0}")]
pub struct HistoryError(pub String);

/// Durable ledger mirror failure.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal write: {0}")]
    Csv(#[from] csv::Error),
}

impl From<JournalError> for PayoutError {
    fn from(err: JournalError) -> Self {
        PayoutError::TransientStore(err.to_string())
    }
}
