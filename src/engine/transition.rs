//! Money movement for payout status changes.
//!
//! Any status may be set from any status. What moves money is only whether
//! the request was debited before the change and whether it is after it.

use crate::Amount;
use crate::model::{PayoutStatus, TransactionKind};

/// Wallet adjustment implied by a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEffect {
    Debit(TransactionKind),
    Credit(TransactionKind),
}

impl WalletEffect {
    /// Signed ledger delta for a payout of `amount`.
    pub fn delta(&self, amount: Amount) -> Amount {
        match self {
            WalletEffect::Debit(_) => -amount,
            WalletEffect::Credit(_) => amount,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            WalletEffect::Debit(kind) | WalletEffect::Credit(kind) => *kind,
        }
    }
}

/// Look up the wallet effect of moving a request from `previous` to `next`.
///
/// | next                 | previous             | effect                  |
/// |----------------------|----------------------|-------------------------|
/// | approved             | pending, rejected    | debit `payout_approved` |
/// | completed            | pending, rejected    | debit `payout_completed`|
/// | approved, completed  | approved, completed  | none                    |
/// | rejected             | approved, completed  | credit `payout_refund`  |
/// | pending              | approved, completed  | credit `payout_reverted`|
/// | rejected, pending    | pending, rejected    | none                    |
pub fn wallet_effect(previous: PayoutStatus, next: PayoutStatus) -> Option<WalletEffect> {
    use PayoutStatus::*;

    match (previous.is_debited(), next) {
        (false, Approved) => Some(WalletEffect::Debit(TransactionKind::PayoutApproved)),
        (false, Completed) => Some(WalletEffect::Debit(TransactionKind::PayoutCompleted)),
        (true, Rejected) => Some(WalletEffect::Credit(TransactionKind::PayoutRefund)),
        (true, Pending) => Some(WalletEffect::Credit(TransactionKind::PayoutReverted)),
        (true, Approved | Completed) | (false, Pending | Rejected) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PayoutStatus::*;

    const ALL: [PayoutStatus; 4] = [Pending, Approved, Rejected, Completed];

    #[test]
    fn debit_on_first_entry_into_paid_states() {
        assert_eq!(
            wallet_effect(Pending, Approved),
            Some(WalletEffect::Debit(TransactionKind::PayoutApproved))
        );
        assert_eq!(
            wallet_effect(Pending, Completed),
            Some(WalletEffect::Debit(TransactionKind::PayoutCompleted))
        );
    }

    #[test]
    fn no_second_debit_between_paid_states() {
        assert_eq!(wallet_effect(Approved, Completed), None);
        assert_eq!(wallet_effect(Completed, Approved), None);
        assert_eq!(wallet_effect(Approved, Approved), None);
    }

    #[test]
    fn refund_only_after_debit() {
        assert_eq!(
            wallet_effect(Approved, Rejected),
            Some(WalletEffect::Credit(TransactionKind::PayoutRefund))
        );
        assert_eq!(
            wallet_effect(Completed, Rejected),
            Some(WalletEffect::Credit(TransactionKind::PayoutRefund))
        );
        assert_eq!(wallet_effect(Pending, Rejected), None);
    }

    #[test]
    fn revert_to_pending_credits_back() {
        assert_eq!(
            wallet_effect(Approved, Pending),
            Some(WalletEffect::Credit(TransactionKind::PayoutReverted))
        );
        assert_eq!(
            wallet_effect(Completed, Pending),
            Some(WalletEffect::Credit(TransactionKind::PayoutReverted))
        );
        assert_eq!(wallet_effect(Rejected, Pending), None);
    }

    #[test]
    fn reapproving_a_rejected_request_debits_again() {
        assert_eq!(
            wallet_effect(Rejected, Approved),
            Some(WalletEffect::Debit(TransactionKind::PayoutApproved))
        );
    }

    #[test]
    fn same_status_never_moves_money() {
        for status in ALL {
            assert_eq!(wallet_effect(status, status), None, "{status}");
        }
    }

    #[test]
    fn every_cycle_nets_to_zero() {
        // any sequence of statuses starting and ending at pending leaves the wallet untouched
        for a in ALL {
            for b in ALL {
                let path = [Pending, a, b, Pending];
                let net: Amount = path
                    .windows(2)
                    .filter_map(|w| wallet_effect(w[0], w[1]))
                    .map(|e| e.delta(Amount::from_minor(4_000)))
                    .sum();
                assert_eq!(net, Amount::ZERO, "{path:?}");
            }
        }
    }

    #[test]
    fn delta_sign() {
        let amount = Amount::from_minor(4_000);
        assert_eq!(
            WalletEffect::Debit(TransactionKind::PayoutApproved).delta(amount),
            -amount
        );
        assert_eq!(
            WalletEffect::Credit(TransactionKind::PayoutRefund).delta(amount),
            amount
        );
    }
}
