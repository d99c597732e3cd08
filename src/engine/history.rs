//! Append-only audit trail of payout status changes.

use std::sync::Mutex;

use chrono::Utc;

use crate::engine::error::HistoryError;
use crate::model::{PayoutId, PayoutStatus, StatusHistoryEntry, UserId};

/// A transition to record; id and timestamp are assigned by the log.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub payout_id: PayoutId,
    pub old_status: Option<PayoutStatus>,
    pub new_status: PayoutStatus,
    pub changed_by: Option<UserId>,
    pub notes: Option<String>,
}

/// Storage for status history. Writes are best-effort from the engine's view.
pub trait HistoryLog: Send + Sync {
    fn append(&self, entry: NewHistoryEntry) -> Result<StatusHistoryEntry, HistoryError>;

    /// Entries for one payout, oldest first.
    fn entries(&self, payout_id: PayoutId) -> Result<Vec<StatusHistoryEntry>, HistoryError>;
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<StatusHistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryLog for MemoryHistory {
    fn append(&self, entry: NewHistoryEntry) -> Result<StatusHistoryEntry, HistoryError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| HistoryError("history lock poisoned".into()))?;
        let record = StatusHistoryEntry {
            id: entries.len() as u64 + 1,
            payout_id: entry.payout_id,
            old_status: entry.old_status,
            new_status: entry.new_status,
            changed_by: entry.changed_by,
            notes: entry.notes,
            created_at: Utc::now(),
        };
        entries.push(record.clone());
        Ok(record)
    }

    fn entries(&self, payout_id: PayoutId) -> Result<Vec<StatusHistoryEntry>, HistoryError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| HistoryError("history lock poisoned".into()))?;
        Ok(entries
            .iter()
            .filter(|e| e.payout_id == payout_id)
            .cloned()
            .collect())
    }
}
