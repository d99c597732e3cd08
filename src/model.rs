//! Core domain types for the payout ledger.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Affiliate (or admin) account identifier.
pub type UserId = u32;

/// Payout request identifier.
pub type PayoutId = u64;

/// Wallet transaction identifier.
pub type TxId = u64;

/// Lifecycle state of a payout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Approved => "approved",
            PayoutStatus::Rejected => "rejected",
            PayoutStatus::Completed => "completed",
        }
    }

    /// Whether the wallet has been debited for a request sitting in this state.
    pub fn is_debited(&self) -> bool {
        matches!(self, PayoutStatus::Approved | PayoutStatus::Completed)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(PayoutStatus::Pending),
            "approved" => Ok(PayoutStatus::Approved),
            "rejected" => Ok(PayoutStatus::Rejected),
            "completed" => Ok(PayoutStatus::Completed),
            other => Err(format!("unknown payout status '{other}'")),
        }
    }
}

/// How the affiliate wants to be paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Paypal,
    Upi,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Upi => "upi",
        }
    }

    /// Key that must be present in the payment details for this method.
    pub fn required_detail(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "account_number",
            PaymentMethod::Paypal => "paypal_email",
            PaymentMethod::Upi => "upi_id",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "paypal" => Ok(PaymentMethod::Paypal),
            "upi" => Ok(PaymentMethod::Upi),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}

/// Method-specific payout destination (account number, paypal email, ...).
pub type PaymentDetails = BTreeMap<String, String>;

/// A withdrawal request against an affiliate wallet.
///
/// `amount` is fixed at creation; only the status and processing fields move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: PayoutId,
    pub user_id: UserId,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub status: PayoutStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<UserId>,
}

/// Input to [`PayoutEngine::create_payout`](crate::PayoutEngine::create_payout).
#[derive(Debug, Clone)]
pub struct NewPayout {
    pub user_id: UserId,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
}

/// Reason code attached to every balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Earnings credited from a completed order.
    Commission,
    PayoutApproved,
    PayoutCompleted,
    PayoutRefund,
    PayoutReverted,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Commission => "commission",
            TransactionKind::PayoutApproved => "payout_approved",
            TransactionKind::PayoutCompleted => "payout_completed",
            TransactionKind::PayoutRefund => "payout_refund",
            TransactionKind::PayoutReverted => "payout_reverted",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of a signed balance adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TxId,
    pub user_id: UserId,
    /// Positive = credit, negative = debit.
    pub amount: Amount,
    pub kind: TransactionKind,
    /// The payout this adjustment belongs to, if any.
    pub payout_id: Option<PayoutId>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One row of a payout's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: u64,
    pub payout_id: PayoutId,
    pub old_status: Option<PayoutStatus>,
    pub new_status: PayoutStatus,
    /// `None` means the change was made by the system.
    pub changed_by: Option<UserId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A history entry with the actor resolved to a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    #[serde(flatten)]
    pub entry: StatusHistoryEntry,
    pub changed_by_name: String,
}

/// Which records a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    User(UserId),
}

impl Scope {
    pub fn includes(&self, user_id: UserId) -> bool {
        match self {
            Scope::All => true,
            Scope::User(id) => *id == user_id,
        }
    }
}

/// A command replayed through [`Replay::run`](crate::replay::Replay::run).
#[derive(Debug, Clone)]
pub enum Command {
    /// Open an affiliate wallet and register the affiliate as approved.
    Open { user: UserId, name: String },
    /// Credit order earnings to a wallet.
    Credit {
        user: UserId,
        amount: Amount,
        description: String,
    },
    /// Affiliate asks to withdraw.
    Request {
        user: UserId,
        amount: Amount,
        method: PaymentMethod,
        /// Value for the method's required payment detail.
        destination: String,
    },
    /// Admin moves a payout to a new status.
    Transition {
        payout: PayoutId,
        status: PayoutStatus,
        actor: UserId,
        notes: Option<String>,
    },
}
