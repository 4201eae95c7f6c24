//! CLI channel: stdin/stdout REPL for driving the bot locally as one
//! operator.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;
use crate::operator::OperatorId;

/// Operator id used by the CLI channel unless configured otherwise.
pub const DEFAULT_CLI_OPERATOR: OperatorId = OperatorId(0);

pub struct CliChannel {
    operator: OperatorId,
}

impl CliChannel {
    pub fn new(operator: OperatorId) -> Self {
        Self { operator }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CLI_OPERATOR)
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let operator = self.operator;

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Open the session the way a Telegram client would.
            if tx
                .send(IncomingMessage::new("cli", operator, "/start"))
                .is_err()
            {
                return;
            }

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", operator, line);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!(error = %e, "Error reading stdin");
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}", response.content);
        if let Some(rows) = &response.keyboard {
            println!("{}", render_keyboard(rows));
        }
        println!();
        eprint!("> ");
        Ok(())
    }
}

/// Render keyboard rows as `[ A | B ]` lines.
fn render_keyboard(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| format!("[ {} ]", row.join(" | ")))
        .collect::<Vec<_>>()
        .join("\n")
}
