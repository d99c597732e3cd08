//! Drive the engine from a stream of commands.

use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::config::{EngineConfig, PayoutPolicy};
use crate::directory::MemoryDirectory;
use crate::engine::{Journal, PayoutEngine, PayoutError};
use crate::model::{Command, NewPayout, PaymentDetails};

/// Applies commands in order against one engine.
///
/// `open` commands register the affiliate in the directory, so a replay file
/// is self-contained.
pub struct Replay {
    engine: PayoutEngine,
    directory: Arc<MemoryDirectory>,
    policy: PayoutPolicy,
}

impl Replay {
    pub fn new(directory: Arc<MemoryDirectory>, policy: PayoutPolicy) -> Self {
        Self {
            engine: PayoutEngine::new(directory.clone()),
            directory,
            policy,
        }
    }

    pub fn with_config(self, config: EngineConfig) -> Self {
        self.map_engine(|engine| engine.with_config(config))
    }

    /// Mirror every ledger entry to `journal`.
    pub fn with_journal(self, journal: Arc<dyn Journal>) -> Self {
        self.map_engine(|engine| engine.with_journal(journal))
    }

    // reconfigure only; the engine must keep reading from `self.directory`
    fn map_engine(self, f: impl FnOnce(PayoutEngine) -> PayoutEngine) -> Self {
        Self {
            engine: f(self.engine),
            ..self
        }
    }

    pub fn engine(&self) -> &PayoutEngine {
        &self.engine
    }

    /// Run every command from the stream. Failed commands are logged and skipped.
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // any error should not stop the replay, so we just ignore the application result
            let _ = self.apply(command).await;
        }
    }

    /// Apply a single command.
    pub async fn apply(&self, command: Command) -> Result<(), PayoutError> {
        let label = label(&command);
        let result = self.dispatch(command).await;
        match &result {
            Ok(()) => info!(command = label, "command applied"),
            Err(e) => warn!(command = label, code = e.reason_code(), reason = %e, "command skipped"),
        }
        result
    }

    async fn dispatch(&self, command: Command) -> Result<(), PayoutError> {
        match command {
            Command::Open { user, name } => {
                self.directory.register_approved(user, name);
                self.engine.open_wallet(user).await;
            }
            Command::Credit {
                user,
                amount,
                description,
            } => {
                self.engine.credit_earnings(user, amount, description).await?;
            }
            Command::Request {
                user,
                amount,
                method,
                destination,
            } => {
                let mut payment_details = PaymentDetails::new();
                payment_details.insert(method.required_detail().to_string(), destination);
                self.engine
                    .create_payout(
                        &self.policy,
                        NewPayout {
                            user_id: user,
                            amount,
                            payment_method: method,
                            payment_details,
                        },
                    )
                    .await?;
            }
            Command::Transition {
                payout,
                status,
                actor,
                notes,
            } => {
                self.engine.transition(payout, status, notes, actor).await?;
            }
        }
        Ok(())
    }
}

fn label(command: &Command) -> &'static str {
    match command {
        Command::Open { .. } => "open",
        Command::Credit { .. } => "credit",
        Command::Request { .. } => "request",
        Command::Transition { .. } => "transition",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;
    use crate::engine::JournalError;
    use crate::model::{PaymentMethod, PayoutStatus, TransactionKind, WalletTransaction};
    use rust_decimal_macros::dec;

    fn open(user: u32) -> Command {
        Command::Open {
            user,
            name: format!("affiliate {user}"),
        }
    }

    fn credit(user: u32, value: rust_decimal::Decimal) -> Command {
        Command::Credit {
            user,
            amount: Amount::new(value),
            description: "order".into(),
        }
    }

    fn request(user: u32, value: rust_decimal::Decimal) -> Command {
        Command::Request {
            user,
            amount: Amount::new(value),
            method: PaymentMethod::Upi,
            destination: "asha@upi".into(),
        }
    }

    fn transition(payout: u64, status: PayoutStatus) -> Command {
        Command::Transition {
            payout,
            status,
            actor: 100,
            notes: None,
        }
    }

    fn replay() -> Replay {
        Replay::new(Arc::new(MemoryDirectory::new()), PayoutPolicy::default())
    }

    #[tokio::test]
    async fn run_processes_all_commands() {
        let replay = replay();
        let commands = vec![
            open(1),
            credit(1, dec!(100)),
            request(1, dec!(40)),
            transition(1, PayoutStatus::Approved),
        ];

        replay.run(tokio_stream::iter(commands)).await;

        assert_eq!(
            replay.engine().get_wallet_balance(1).await.unwrap(),
            Amount::new(dec!(60))
        );
    }

    #[tokio::test]
    async fn run_skips_failed_commands_and_continues() {
        let replay = replay();
        let commands = vec![
            open(1),
            credit(1, dec!(100)),
            request(1, dec!(40)),
            request(1, dec!(70)), // over-pledged
            transition(9, PayoutStatus::Approved), // unknown payout
            credit(1, dec!(5)),
        ];

        replay.run(tokio_stream::iter(commands)).await;

        let engine = replay.engine();
        assert_eq!(engine.get_wallet_balance(1).await.unwrap(), Amount::new(dec!(105)));
        assert_eq!(
            engine.available_balance(1).await.unwrap(),
            Amount::new(dec!(65))
        );
    }

    #[derive(Default)]
    struct RecordingJournal(std::sync::Mutex<Vec<TransactionKind>>);

    impl Journal for RecordingJournal {
        fn record(&self, tx: &WalletTransaction) -> Result<(), JournalError> {
            self.0.lock().unwrap().push(tx.kind);
            Ok(())
        }
    }

    #[tokio::test]
    async fn journal_keeps_the_replay_directory() {
        let journal = Arc::new(RecordingJournal::default());
        let replay = replay().with_journal(journal.clone());
        let commands = vec![
            open(1),
            credit(1, dec!(100)),
            request(1, dec!(40)),
            transition(1, PayoutStatus::Approved),
        ];

        replay.run(tokio_stream::iter(commands)).await;

        assert_eq!(
            replay.engine().get_wallet_balance(1).await.unwrap(),
            Amount::new(dec!(60))
        );
        assert_eq!(
            *journal.0.lock().unwrap(),
            [TransactionKind::Commission, TransactionKind::PayoutApproved]
        );
    }

    #[tokio::test]
    async fn request_before_open_is_not_found() {
        let replay = replay();
        let result = replay.apply(request(1, dec!(10))).await;
        assert_eq!(result.unwrap_err().reason_code(), "not_found");
    }
}
