use std::collections::BTreeMap;

use crate::Amount;
use crate::engine::error::WalletError;
use crate::model::{PayoutId, PayoutRequest, PayoutStatus, UserId, WalletTransaction};

/// An affiliate's spendable balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    user_id: UserId,
    balance: Amount,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: Amount::ZERO,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Balance after applying `delta`, without touching the wallet.
    ///
    /// A debit may never take the balance below zero, and no adjustment may
    /// leave the representable range.
    pub fn preview(&self, delta: Amount) -> Result<Amount, WalletError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or(WalletError::Overflow(self.user_id))?;
        if delta.is_negative() && next.is_negative() {
            return Err(WalletError::InsufficientFunds(
                self.user_id,
                self.balance,
                -delta,
            ));
        }
        Ok(next)
    }

    /// Add `delta` to the balance and return the new balance.
    pub fn adjust(&mut self, delta: Amount) -> Result<Amount, WalletError> {
        self.balance = self.preview(delta)?;
        Ok(self.balance)
    }
}

/// Everything the engine owns for one user, guarded by a single lock.
#[derive(Debug)]
pub struct WalletBook {
    pub(crate) wallet: Wallet,
    pub(crate) payouts: BTreeMap<PayoutId, PayoutRequest>,
    pub(crate) transactions: Vec<WalletTransaction>,
}

impl WalletBook {
    pub fn new(user_id: UserId) -> Self {
        Self {
            wallet: Wallet::new(user_id),
            payouts: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }

    /// Sum of amounts promised to requests still waiting for review.
    pub fn pending_total(&self) -> Result<Amount, WalletError> {
        pending_total(self.payouts.values()).ok_or_else(|| self.overflow())
    }

    /// Balance not yet pledged to a pending request.
    pub fn available(&self) -> Result<Amount, WalletError> {
        available(self.wallet.balance(), self.payouts.values()).ok_or_else(|| self.overflow())
    }

    /// Pending total after `amount` more is pledged, without touching the book.
    pub fn preview_pledge(&self, amount: Amount) -> Result<Amount, WalletError> {
        self.pending_total()?
            .checked_add(amount)
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> WalletError {
        WalletError::Overflow(self.wallet.user_id())
    }
}

/// `None` if the sum leaves the representable range.
pub fn pending_total<'a>(
    payouts: impl IntoIterator<Item = &'a PayoutRequest>,
) -> Option<Amount> {
    payouts
        .into_iter()
        .filter(|p| p.status == PayoutStatus::Pending)
        .try_fold(Amount::ZERO, |total, p| total.checked_add(p.amount))
}

/// Withdrawable balance: `balance - sum(pending payouts)`.
pub fn available<'a>(
    balance: Amount,
    payouts: impl IntoIterator<Item = &'a PayoutRequest>,
) -> Option<Amount> {
    balance.checked_sub(pending_total(payouts)?)
}
