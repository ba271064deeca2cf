pub mod amount;
pub mod balance;
pub mod config;
pub mod csv;
pub mod intake;
pub mod model;
pub mod reconcile;
pub mod replay;
pub mod store;

pub use amount::{Amount, AmountError};
pub use config::Config;
pub use intake::{IntakeError, IntakeService};
pub use model::{
    Account, EventStatus, LedgerEntry, MessageId, TransactionEvent, TransactionRequest,
    TransactionResponse, TransactionType, UserId,
};
pub use reconcile::{ReconcileError, ReconcileTrigger, ReconcileWorker, Reconciler, RetryPolicy};
