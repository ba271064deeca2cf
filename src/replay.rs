//! Feeds a stream of commands through the intake service.

use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use crate::intake::IntakeService;
use crate::Amount;
use crate::model::{MessageId, TransactionRequest, UserId};

/// One row of a replay file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Provision an account with an opening balance. `currency` is only
    /// used for a non-zero balance.
    Open {
        user_id: UserId,
        balance: Amount,
        currency: String,
    },
    Load {
        path_message_id: MessageId,
        request: TransactionRequest,
    },
    Authorize {
        path_message_id: MessageId,
        request: TransactionRequest,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub opened: usize,
    pub accepted: usize,
    pub rejected: usize,
}

pub struct Replay {
    service: IntakeService,
}

impl Replay {
    pub fn new(service: IntakeService) -> Self {
        Self { service }
    }

    /// Run every command of the stream. Rejections are logged and do not stop the replay.
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        while let Some(command) = stream.next().await {
            match command {
                Command::Open {
                    user_id,
                    balance,
                    currency,
                } => match self.service.open(&user_id, balance, &currency).await {
                    Ok(_) => summary.opened += 1,
                    Err(e) => {
                        warn!(user = %user_id, reason = %e, "open rejected");
                        summary.rejected += 1;
                    }
                },
                Command::Load {
                    path_message_id,
                    request,
                } => {
                    let message = request.message_id.clone();
                    match self.service.load(request, &path_message_id).await {
                        Ok(_) => summary.accepted += 1,
                        Err(e) => {
                            warn!(message = %message, reason = %e, "load rejected");
                            summary.rejected += 1;
                        }
                    }
                }
                Command::Authorize {
                    path_message_id,
                    request,
                } => {
                    let message = request.message_id.clone();
                    match self.service.authorize(request, &path_message_id).await {
                        Ok(_) => summary.accepted += 1,
                        Err(e) => {
                            warn!(message = %message, reason = %e, "authorize rejected");
                            summary.rejected += 1;
                        }
                    }
                }
            }
        }
        summary
    }
}
