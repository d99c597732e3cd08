use std::sync::Arc;

use payout_ledger::directory::MemoryDirectory;
use payout_ledger::engine::Missing;
use payout_ledger::model::PaymentDetails;
use payout_ledger::{
    Amount, NewPayout, PaymentMethod, PayoutEngine, PayoutError, PayoutPolicy, PayoutStatus,
    Scope, TransactionKind, UserId, WalletTransaction,
};
use rust_decimal_macros::dec;

const AFFILIATE: UserId = 1;
const ADMIN: UserId = 100;

async fn engine_with_balance(balance: Amount) -> PayoutEngine {
    let directory = Arc::new(MemoryDirectory::new());
    directory.register_approved(AFFILIATE, "Asha");
    directory.register_approved(ADMIN, "Admin");
    let engine = PayoutEngine::new(directory);
    engine.open_wallet(AFFILIATE).await;
    engine
        .credit_earnings(AFFILIATE, balance, "seed")
        .await
        .unwrap();
    engine
}

fn bank(amount: Amount) -> NewPayout {
    let mut payment_details = PaymentDetails::new();
    payment_details.insert("account_number".into(), "000123".into());
    NewPayout {
        user_id: AFFILIATE,
        amount,
        payment_method: PaymentMethod::BankTransfer,
        payment_details,
    }
}

async fn request(engine: &PayoutEngine, amount: Amount) -> u64 {
    engine
        .create_payout(&PayoutPolicy::default(), bank(amount))
        .await
        .unwrap()
        .id
}

async fn payout_entries(engine: &PayoutEngine) -> Vec<WalletTransaction> {
    engine
        .list_transactions(Scope::User(AFFILIATE))
        .await
        .unwrap()
        .into_iter()
        .filter(|tx| tx.kind != TransactionKind::Commission)
        .collect()
}

async fn assert_conserved(engine: &PayoutEngine) {
    let ledger_sum: Amount = engine
        .list_transactions(Scope::User(AFFILIATE))
        .await
        .unwrap()
        .iter()
        .map(|tx| tx.amount)
        .sum();
    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        ledger_sum
    );
}

fn amt(value: rust_decimal::Decimal) -> Amount {
    Amount::new(value)
}

#[tokio::test]
async fn scenario_a_second_request_is_over_pledged() {
    let engine = engine_with_balance(amt(dec!(100))).await;

    let first = engine
        .create_payout(&PayoutPolicy::default(), bank(amt(dec!(40))))
        .await
        .unwrap();
    assert_eq!(first.status, PayoutStatus::Pending);

    let second = engine
        .create_payout(&PayoutPolicy::default(), bank(amt(dec!(70))))
        .await;
    match second {
        Err(PayoutError::OverPledged {
            available,
            requested,
        }) => {
            assert_eq!(available, amt(dec!(60)));
            assert_eq!(requested, amt(dec!(70)));
        }
        other => panic!("expected over-pledged, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_b_approval_debits_once() {
    let engine = engine_with_balance(amt(dec!(100))).await;
    let id = request(&engine, amt(dec!(40))).await;

    engine
        .transition(id, PayoutStatus::Approved, None, ADMIN)
        .await
        .unwrap();

    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        amt(dec!(60))
    );
    let entries = payout_entries(&engine).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, amt(dec!(-40)));
    assert_eq!(entries[0].kind, TransactionKind::PayoutApproved);
    assert_eq!(entries[0].payout_id, Some(id));
    assert_conserved(&engine).await;
}

#[tokio::test]
async fn scenario_c_rejecting_an_approved_payout_refunds() {
    let engine = engine_with_balance(amt(dec!(100))).await;
    let id = request(&engine, amt(dec!(40))).await;
    engine
        .transition(id, PayoutStatus::Approved, None, ADMIN)
        .await
        .unwrap();

    engine
        .transition(id, PayoutStatus::Rejected, Some("bank bounced".into()), ADMIN)
        .await
        .unwrap();

    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        amt(dec!(100))
    );
    let refunds: Vec<_> = payout_entries(&engine)
        .await
        .into_iter()
        .filter(|tx| tx.kind == TransactionKind::PayoutRefund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount, amt(dec!(40)));
    assert_conserved(&engine).await;
}

#[tokio::test]
async fn scenario_d_rejecting_a_pending_payout_moves_nothing() {
    let engine = engine_with_balance(amt(dec!(100))).await;
    let id = request(&engine, amt(dec!(40))).await;

    engine
        .transition(id, PayoutStatus::Rejected, None, ADMIN)
        .await
        .unwrap();

    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        amt(dec!(100))
    );
    assert!(payout_entries(&engine).await.is_empty());
    // a rejected request no longer holds funds
    assert_eq!(
        engine.available_balance(AFFILIATE).await.unwrap(),
        amt(dec!(100))
    );
}

#[tokio::test]
async fn scenario_e_request_above_balance_is_insufficient() {
    let engine = engine_with_balance(amt(dec!(30))).await;

    let result = engine
        .create_payout(&PayoutPolicy::default(), bank(amt(dec!(40))))
        .await;
    assert!(matches!(result, Err(PayoutError::InsufficientFunds { .. })));
    assert_eq!(result.unwrap_err().reason_code(), "insufficient_funds");
    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        amt(dec!(30))
    );
    assert!(
        engine
            .list_payout_requests(Scope::All)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn toggling_statuses_never_debits_twice() {
    let engine = engine_with_balance(amt(dec!(100))).await;
    let id = request(&engine, amt(dec!(40))).await;

    for status in [
        PayoutStatus::Approved,
        PayoutStatus::Completed,
        PayoutStatus::Approved,
        PayoutStatus::Completed,
    ] {
        engine.transition(id, status, None, ADMIN).await.unwrap();
    }

    let debits = payout_entries(&engine)
        .await
        .into_iter()
        .filter(|tx| tx.amount.is_negative())
        .count();
    assert_eq!(debits, 1);
    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        amt(dec!(60))
    );
    assert_conserved(&engine).await;
}

#[tokio::test]
async fn every_refund_follows_a_debit() {
    let engine = engine_with_balance(amt(dec!(100))).await;
    let id = request(&engine, amt(dec!(40))).await;

    let path = [
        PayoutStatus::Rejected,
        PayoutStatus::Pending,
        PayoutStatus::Completed,
        PayoutStatus::Pending,
        PayoutStatus::Approved,
        PayoutStatus::Rejected,
        PayoutStatus::Rejected,
    ];
    for status in path {
        engine.transition(id, status, None, ADMIN).await.unwrap();
    }

    let mut entries = payout_entries(&engine).await;
    entries.reverse(); // oldest first
    let kinds: Vec<_> = entries.iter().map(|tx| tx.kind).collect();
    assert_eq!(
        kinds,
        [
            TransactionKind::PayoutCompleted,
            TransactionKind::PayoutReverted,
            TransactionKind::PayoutApproved,
            TransactionKind::PayoutRefund,
        ]
    );
    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        amt(dec!(100))
    );
    assert_conserved(&engine).await;
}

#[tokio::test]
async fn approval_without_funds_leaves_everything_unchanged() {
    let engine = engine_with_balance(amt(dec!(100))).await;
    let big = request(&engine, amt(dec!(80))).await;
    engine
        .transition(big, PayoutStatus::Rejected, None, ADMIN)
        .await
        .unwrap();
    let small = request(&engine, amt(dec!(60))).await;
    engine
        .transition(small, PayoutStatus::Approved, None, ADMIN)
        .await
        .unwrap();

    // 40 left, re-approving the rejected 80 must not overdraw
    let result = engine
        .transition(big, PayoutStatus::Approved, None, ADMIN)
        .await;
    assert!(matches!(result, Err(PayoutError::InsufficientFunds { .. })));

    assert_eq!(
        engine.get_payout(big).await.unwrap().status,
        PayoutStatus::Rejected
    );
    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        amt(dec!(40))
    );
    assert_eq!(payout_entries(&engine).await.len(), 1);
}

#[tokio::test]
async fn history_reconstructs_every_transition() {
    let engine = engine_with_balance(amt(dec!(100))).await;
    let id = request(&engine, amt(dec!(40))).await;
    for status in [
        PayoutStatus::Approved,
        PayoutStatus::Pending,
        PayoutStatus::Completed,
    ] {
        engine.transition(id, status, None, ADMIN).await.unwrap();
    }

    let mut history = engine.list_status_history(id).await.unwrap();
    history.reverse();
    let trail: Vec<_> = history
        .iter()
        .map(|r| (r.entry.old_status, r.entry.new_status))
        .collect();
    assert_eq!(
        trail,
        [
            (None, PayoutStatus::Pending),
            (Some(PayoutStatus::Pending), PayoutStatus::Approved),
            (Some(PayoutStatus::Approved), PayoutStatus::Pending),
            (Some(PayoutStatus::Pending), PayoutStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn unknown_payout_is_not_found() {
    let engine = engine_with_balance(amt(dec!(100))).await;
    let result = engine
        .transition(404, PayoutStatus::Approved, None, ADMIN)
        .await;
    assert!(matches!(
        result,
        Err(PayoutError::NotFound(Missing::Payout(404)))
    ));
}

// Concurrency

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_of_one_payout_debit_once() {
    let engine = Arc::new(engine_with_balance(amt(dec!(100))).await);
    let id = request(&engine, amt(dec!(40))).await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let status = if i % 2 == 0 {
                PayoutStatus::Approved
            } else {
                PayoutStatus::Completed
            };
            tokio::spawn(async move { engine.transition(id, status, None, ADMIN).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(payout_entries(&engine).await.len(), 1);
    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        amt(dec!(60))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_never_overdraw() {
    let engine = Arc::new(engine_with_balance(amt(dec!(100))).await);
    // pledge the full balance across ten requests, then let a rejected one race in
    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(request(&engine, amt(dec!(10))).await);
    }
    engine
        .transition(ids[0], PayoutStatus::Rejected, None, ADMIN)
        .await
        .unwrap();
    ids.push(request(&engine, amt(dec!(10))).await);

    let tasks: Vec<_> = ids
        .iter()
        .map(|&id| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .transition(id, PayoutStatus::Approved, None, ADMIN)
                    .await
            })
        })
        .collect();

    let mut approved = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => approved += 1,
            Err(PayoutError::InsufficientFunds { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(approved, 10);
    assert_eq!(refused, 1);
    assert_eq!(
        engine.get_wallet_balance(AFFILIATE).await.unwrap(),
        Amount::ZERO
    );
    assert_conserved(&engine).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_cannot_double_pledge() {
    let engine = Arc::new(engine_with_balance(amt(dec!(100))).await);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .create_payout(&PayoutPolicy::default(), bank(amt(dec!(30))))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(PayoutError::OverPledged { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created, 3);
    assert_eq!(
        engine.available_balance(AFFILIATE).await.unwrap(),
        amt(dec!(10))
    );
}
