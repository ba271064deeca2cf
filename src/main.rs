use std::env;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use wallet_recon::csv::{read_commands, write_accounts};
use wallet_recon::replay::Replay;
use wallet_recon::store::MemoryStores;
use wallet_recon::{Config, IntakeService, Reconciler, reconcile};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: wallet-recon <requests.csv>");
        return ExitCode::from(2);
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(reason = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    let commands = match read_commands(path.clone()) {
        Ok(commands) => commands,
        Err(e) => {
            error!(reason = %e, "cannot read input");
            return ExitCode::FAILURE;
        }
    };

    let stores = MemoryStores::new();
    let reconciler = Arc::new(Reconciler::new(
        stores.events.clone(),
        stores.accounts.clone(),
        stores.ledger.clone(),
        config.retry,
    ));
    let (trigger, worker) = reconcile::channel(reconciler, config.sweep_interval);
    let worker = worker.spawn();

    let service = IntakeService::new(stores.events.clone(), stores.accounts.clone(), trigger);
    let replay = Replay::new(service);
    let (cmd_sender, cmd_receiver) = tokio::sync::mpsc::channel(16);

    let reader = tokio::task::spawn_blocking(move || {
        for result in commands {
            match result {
                Ok(command) => {
                    if cmd_sender.blocking_send(command).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    replay.run(ReceiverStream::new(cmd_receiver)).await;
    if let Err(e) = reader.await {
        error!(reason = %e, "input reader panicked");
    }

    // dropping the last trigger lets the worker finish its queued run and exit
    drop(replay);
    if let Err(e) = worker.await {
        error!(reason = %e, "reconciliation worker panicked");
    }

    let accounts = stores.accounts.all().await;
    if let Err(e) = write_accounts(&accounts, io::stdout().lock()) {
        error!(reason = %e, "cannot write accounts");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
