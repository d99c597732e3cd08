//! Durable mirror of wallet transactions.

use crate::engine::error::JournalError;
use crate::model::WalletTransaction;

/// Receives every wallet transaction before it is committed in memory.
///
/// A failed `record` aborts the operation that produced the transaction.
pub trait Journal: Send + Sync {
    fn record(&self, tx: &WalletTransaction) -> Result<(), JournalError>;
}

/// Keeps the ledger in memory only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl Journal for NullJournal {
    fn record(&self, _tx: &WalletTransaction) -> Result<(), JournalError> {
        Ok(())
    }
}
