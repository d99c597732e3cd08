//! Payout request and wallet ledger engine.
//!
//! The engine owns one [`WalletBook`] per affiliate: the wallet balance, that
//! affiliate's payout requests and its ledger entries. Every operation that
//! reads and then writes a balance holds that book's lock for the whole
//! check-then-update, so two admins acting on the same wallet are serialized
//! while different wallets never contend.
//!
//! Status history and notifications run after the core state is committed and
//! cannot undo it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::Amount;
use crate::config::{EngineConfig, PayoutPolicy};
use crate::directory::Directory;
use crate::model::{
    HistoryRecord, NewPayout, PayoutId, PayoutRequest, PayoutStatus, Scope, TransactionKind,
    TxId, UserId, WalletTransaction,
};
use crate::notify::{LogNotifier, NotificationEvent, NotificationKind, Notifier};

mod error;
pub use error::{HistoryError, JournalError, Missing, PayoutError, WalletError};

mod wallet;
pub use wallet::{Wallet, WalletBook, available, pending_total};

mod transition;
pub use transition::{WalletEffect, wallet_effect};

mod history;
pub use history::{HistoryLog, MemoryHistory, NewHistoryEntry};

mod ledger;
pub use ledger::{Journal, NullJournal};

/// Actor name shown for history entries without an actor.
const SYSTEM_ACTOR: &str = "System";

/// Coordinates wallets, payout requests, the ledger and the audit trail.
pub struct PayoutEngine {
    config: EngineConfig,
    books: RwLock<HashMap<UserId, Arc<Mutex<WalletBook>>>>,
    /// Payout id -> owning user, so a transition can find the book to lock.
    owners: RwLock<HashMap<PayoutId, UserId>>,
    next_payout_id: AtomicU64,
    next_tx_id: AtomicU64,
    directory: Arc<dyn Directory>,
    history: Arc<dyn HistoryLog>,
    notifier: Arc<dyn Notifier>,
    journal: Arc<dyn Journal>,
}

/// Public API
impl PayoutEngine {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            config: EngineConfig::default(),
            books: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
            next_payout_id: AtomicU64::new(1),
            next_tx_id: AtomicU64::new(1),
            directory,
            history: Arc::new(MemoryHistory::new()),
            notifier: Arc::new(LogNotifier),
            journal: Arc::new(NullJournal),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryLog>) -> Self {
        self.history = history;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = journal;
        self
    }

    /// Create an empty wallet for `user_id`. Opening an existing wallet is a no-op.
    pub async fn open_wallet(&self, user_id: UserId) {
        self.books
            .write()
            .await
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(WalletBook::new(user_id))));
    }

    /// Credit order earnings to a wallet, returning the new balance.
    pub async fn credit_earnings(
        &self,
        user_id: UserId,
        amount: Amount,
        description: impl Into<String>,
    ) -> Result<Amount, PayoutError> {
        if !amount.is_positive() {
            return Err(PayoutError::Validation(format!(
                "credit amount must be positive, got {amount}"
            )));
        }

        let book = self.book(user_id).await?;
        let mut book = self.lock(&book).await?;

        let tx = self.new_transaction(
            user_id,
            amount,
            TransactionKind::Commission,
            None,
            description.into(),
        );
        let balance = self.commit_transaction(&mut book, tx)?;

        info!(user = user_id, amount = %amount, balance = %balance, "earnings credited");
        Ok(balance)
    }

    pub async fn get_wallet_balance(&self, user_id: UserId) -> Result<Amount, PayoutError> {
        let book = self.book(user_id).await?;
        let book = self.lock(&book).await?;
        Ok(book.wallet.balance())
    }

    /// Balance minus everything pledged to pending payout requests.
    pub async fn available_balance(&self, user_id: UserId) -> Result<Amount, PayoutError> {
        let book = self.book(user_id).await?;
        let book = self.lock(&book).await?;
        Ok(book.available()?)
    }

    /// Create a `pending` payout request.
    ///
    /// No money moves here. The amount is held only in the sense that it is
    /// subtracted from the available balance of later requests.
    pub async fn create_payout(
        &self,
        policy: &PayoutPolicy,
        request: NewPayout,
    ) -> Result<PayoutRequest, PayoutError> {
        let NewPayout {
            user_id,
            amount,
            payment_method,
            payment_details,
        } = request;

        if !amount.is_positive() {
            return Err(PayoutError::Validation(format!(
                "payout amount must be positive, got {amount}"
            )));
        }
        let field = payment_method.required_detail();
        if payment_details.get(field).is_none_or(|v| v.trim().is_empty()) {
            return Err(PayoutError::Validation(format!(
                "payment details are missing '{field}'"
            )));
        }

        let affiliate = self
            .directory
            .affiliate(user_id)
            .ok_or(PayoutError::NotFound(Missing::Affiliate(user_id)))?;
        if !affiliate.approved {
            return Err(PayoutError::AccountNotApproved(user_id));
        }

        let book = self.book(user_id).await?;
        let mut book = self.lock(&book).await?;

        let balance = book.wallet.balance();
        if amount > balance {
            return Err(PayoutError::InsufficientFunds {
                user: user_id,
                balance,
                requested: amount,
            });
        }
        if amount < policy.min_payout_amount {
            return Err(PayoutError::BelowMinimum {
                minimum: policy.min_payout_amount,
                requested: amount,
            });
        }
        let available = book.available()?;
        if amount > available {
            return Err(PayoutError::OverPledged {
                available,
                requested: amount,
            });
        }

        let payout = PayoutRequest {
            id: self.next_payout_id.fetch_add(1, Ordering::Relaxed),
            user_id,
            amount,
            payment_method,
            payment_details,
            status: PayoutStatus::Pending,
            admin_notes: None,
            created_at: Utc::now(),
            processed_at: None,
            processed_by: None,
        };
        book.payouts.insert(payout.id, payout.clone());
        self.owners.write().await.insert(payout.id, user_id);

        self.record_history(NewHistoryEntry {
            payout_id: payout.id,
            old_status: None,
            new_status: PayoutStatus::Pending,
            changed_by: Some(user_id),
            notes: None,
        });
        drop(book);

        info!(payout = payout.id, user = user_id, amount = %amount, "payout requested");
        self.notify(NotificationEvent {
            kind: NotificationKind::PayoutRequested,
            user_id,
            email: affiliate.email,
            amount,
            notes: None,
        });

        Ok(payout)
    }

    /// Move a payout request to `new_status` on behalf of admin `actor_id`.
    ///
    /// Any status can follow any other. The wallet is debited or credited
    /// according to [`wallet_effect`], and that adjustment, its ledger entry
    /// and the status change are applied together or not at all.
    pub async fn transition(
        &self,
        payout_id: PayoutId,
        new_status: PayoutStatus,
        admin_notes: Option<String>,
        actor_id: UserId,
    ) -> Result<PayoutRequest, PayoutError> {
        let user_id = self.owner_of(payout_id).await?;
        let book = self.book(user_id).await?;
        let mut guard = self.lock(&book).await?;
        let book = &mut *guard;

        let (previous, amount) = book
            .payouts
            .get(&payout_id)
            .map(|p| (p.status, p.amount))
            .ok_or(PayoutError::NotFound(Missing::Payout(payout_id)))?;
        if new_status == PayoutStatus::Pending && previous != PayoutStatus::Pending {
            book.preview_pledge(amount)?;
        }
        let payout = book
            .payouts
            .get_mut(&payout_id)
            .ok_or(PayoutError::NotFound(Missing::Payout(payout_id)))?;

        // Stage the ledger entry and journal it before anything is mutated.
        let staged = match wallet_effect(previous, new_status) {
            Some(effect) => {
                let delta = effect.delta(amount);
                book.wallet.preview(delta)?;
                let tx = self.new_transaction(
                    user_id,
                    delta,
                    effect.kind(),
                    Some(payout_id),
                    describe(effect.kind(), payout_id),
                );
                self.journal.record(&tx)?;
                Some(tx)
            }
            None => None,
        };

        if let Some(tx) = staged {
            book.wallet.adjust(tx.amount)?;
            book.transactions.push(tx);
        }
        payout.status = new_status;
        if admin_notes.is_some() {
            payout.admin_notes = admin_notes.clone();
        }
        payout.processed_at = Some(Utc::now());
        payout.processed_by = Some(actor_id);
        let updated = payout.clone();
        let balance = book.wallet.balance();

        self.record_history(NewHistoryEntry {
            payout_id,
            old_status: Some(previous),
            new_status,
            changed_by: Some(actor_id),
            notes: admin_notes.clone(),
        });
        drop(guard);

        info!(
            payout = payout_id,
            user = user_id,
            from = %previous,
            to = %new_status,
            balance = %balance,
            "payout transitioned"
        );
        self.notify(NotificationEvent {
            kind: NotificationKind::for_status(new_status),
            user_id,
            email: self.directory.affiliate(user_id).and_then(|a| a.email),
            amount: updated.amount,
            notes: admin_notes,
        });

        Ok(updated)
    }

    pub async fn get_payout(&self, payout_id: PayoutId) -> Result<PayoutRequest, PayoutError> {
        let user_id = self.owner_of(payout_id).await?;
        let book = self.book(user_id).await?;
        let book = self.lock(&book).await?;
        book.payouts
            .get(&payout_id)
            .cloned()
            .ok_or(PayoutError::NotFound(Missing::Payout(payout_id)))
    }

    /// Payout requests in `scope`, newest first.
    pub async fn list_payout_requests(
        &self,
        scope: Scope,
    ) -> Result<Vec<PayoutRequest>, PayoutError> {
        let mut payouts = Vec::new();
        for book in self.books_in(scope).await? {
            let book = self.lock(&book).await?;
            payouts.extend(book.payouts.values().cloned());
        }
        payouts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(payouts)
    }

    /// Ledger entries in `scope`, newest first.
    pub async fn list_transactions(
        &self,
        scope: Scope,
    ) -> Result<Vec<WalletTransaction>, PayoutError> {
        let mut transactions = Vec::new();
        for book in self.books_in(scope).await? {
            let book = self.lock(&book).await?;
            transactions.extend(book.transactions.iter().cloned());
        }
        transactions.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(transactions)
    }

    /// Audit trail of one payout, newest first, with actor names resolved.
    pub async fn list_status_history(
        &self,
        payout_id: PayoutId,
    ) -> Result<Vec<HistoryRecord>, PayoutError> {
        self.owner_of(payout_id).await?;

        let mut entries = self
            .history
            .entries(payout_id)
            .map_err(|e| PayoutError::TransientStore(e.to_string()))?;
        entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(entries
            .into_iter()
            .map(|entry| {
                let changed_by_name = match entry.changed_by {
                    Some(actor) => self
                        .directory
                        .display_name(actor)
                        .unwrap_or_else(|| format!("User #{actor}")),
                    None => SYSTEM_ACTOR.to_string(),
                };
                HistoryRecord {
                    entry,
                    changed_by_name,
                }
            })
            .collect())
    }

    /// Snapshot of every wallet as `(user, balance, pending, available)`, ordered by user.
    pub async fn wallets(&self) -> Result<Vec<(UserId, Amount, Amount, Amount)>, PayoutError> {
        let mut rows = Vec::new();
        for book in self.books_in(Scope::All).await? {
            let book = self.lock(&book).await?;
            rows.push((
                book.wallet.user_id(),
                book.wallet.balance(),
                book.pending_total()?,
                book.available()?,
            ));
        }
        rows.sort_by_key(|row| row.0);
        Ok(rows)
    }
}

/// Private API
impl PayoutEngine {
    async fn book(&self, user_id: UserId) -> Result<Arc<Mutex<WalletBook>>, PayoutError> {
        self.books
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(PayoutError::NotFound(Missing::Wallet(user_id)))
    }

    async fn books_in(&self, scope: Scope) -> Result<Vec<Arc<Mutex<WalletBook>>>, PayoutError> {
        if let Scope::User(user_id) = scope {
            // surface a missing wallet instead of an empty listing
            self.book(user_id).await?;
        }
        Ok(self
            .books
            .read()
            .await
            .iter()
            .filter(|(user_id, _)| scope.includes(**user_id))
            .map(|(_, book)| Arc::clone(book))
            .collect())
    }

    async fn owner_of(&self, payout_id: PayoutId) -> Result<UserId, PayoutError> {
        self.owners
            .read()
            .await
            .get(&payout_id)
            .copied()
            .ok_or(PayoutError::NotFound(Missing::Payout(payout_id)))
    }

    /// Acquire a wallet lock, bounded by the configured timeout.
    async fn lock<'a>(
        &self,
        book: &'a Mutex<WalletBook>,
    ) -> Result<MutexGuard<'a, WalletBook>, PayoutError> {
        tokio::time::timeout(self.config.lock_timeout, book.lock())
            .await
            .map_err(|_| {
                PayoutError::TransientStore(format!(
                    "wallet lock not acquired within {:?}",
                    self.config.lock_timeout
                ))
            })
    }

    fn new_transaction(
        &self,
        user_id: UserId,
        amount: Amount,
        kind: TransactionKind,
        payout_id: Option<PayoutId>,
        description: String,
    ) -> WalletTransaction {
        let id: TxId = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        WalletTransaction {
            id,
            user_id,
            amount,
            kind,
            payout_id,
            description,
            created_at: Utc::now(),
        }
    }

    /// Journal `tx`, then apply it to the wallet and append it to the ledger.
    fn commit_transaction(
        &self,
        book: &mut WalletBook,
        tx: WalletTransaction,
    ) -> Result<Amount, PayoutError> {
        book.wallet.preview(tx.amount)?;
        self.journal.record(&tx)?;
        let balance = book.wallet.adjust(tx.amount)?;
        book.transactions.push(tx);
        Ok(balance)
    }

    fn record_history(&self, entry: NewHistoryEntry) {
        let payout_id = entry.payout_id;
        if let Err(e) = self.history.append(entry) {
            warn!(payout = payout_id, error = %e, "status history not recorded");
        }
    }

    /// Fire-and-forget; delivery failures are logged and dropped.
    fn notify(&self, event: NotificationEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let kind = event.kind.as_str();
            let user = event.user_id;
            if let Err(e) = notifier.send(event).await {
                warn!(event = kind, user, error = %e, "notification dropped");
            }
        });
    }
}

fn describe(kind: TransactionKind, payout_id: PayoutId) -> String {
    match kind {
        TransactionKind::PayoutApproved => format!("Payout #{payout_id} approved"),
        TransactionKind::PayoutCompleted => format!("Payout #{payout_id} completed"),
        TransactionKind::PayoutRefund => format!("Refund for rejected payout #{payout_id}"),
        TransactionKind::PayoutReverted => format!("Payout #{payout_id} reverted to pending"),
        TransactionKind::Commission => format!("Payout #{payout_id} adjustment"),
    }
}
