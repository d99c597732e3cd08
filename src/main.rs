use std::env;
use std::sync::Arc;

use payout_ledger::csv::{CsvJournal, read_commands, write_wallets};
use payout_ledger::directory::MemoryDirectory;
use payout_ledger::replay::Replay;
use payout_ledger::{EngineConfig, PayoutPolicy};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let path = args
        .next()
        .expect("usage: payout-ledger <commands.csv> [journal.csv]");
    let journal_path = args.next();

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let commands = match read_commands(path.clone()) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let mut replay = Replay::new(Arc::new(MemoryDirectory::new()), PayoutPolicy::from_env())
        .with_config(EngineConfig::from_env());
    if let Some(journal_path) = journal_path {
        match CsvJournal::create(&journal_path) {
            Ok(journal) => replay = replay.with_journal(Arc::new(journal)),
            Err(e) => {
                error!(path = journal_path, "cannot open journal: {e}");
                std::process::exit(1);
            }
        }
    }

    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if command_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    replay.run(ReceiverStream::new(command_receiver)).await;

    let wallets = match replay.engine().wallets().await {
        Ok(wallets) => wallets,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = write_wallets(std::io::stdout().lock(), wallets) {
        error!("{e}");
        std::process::exit(1);
    }
}
