//! Bot runtime: feeds channel messages to the dispatcher and sends replies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broadcast::BroadcastManager;
use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse};
use crate::dispatch::{Dispatcher, Reply, menu_labels};
use crate::error::Error;
use crate::operator::OperatorId;

pub struct Bot {
    dispatcher: Arc<Dispatcher>,
    broadcast: Arc<BroadcastManager>,
    channels: Arc<ChannelManager>,
}

impl Bot {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        broadcast: Arc<BroadcastManager>,
        channels: ChannelManager,
    ) -> Self {
        Self {
            dispatcher,
            broadcast,
            channels: Arc::new(channels),
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    ///
    /// Each operator's messages are handled in arrival order on that
    /// operator's own task, so one slow login never delays other operators.
    /// A worker idle for `WORKER_IDLE_TIMEOUT` exits and is replaced on the
    /// operator's next message.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channels.start_all().await?;
        let mut workers: HashMap<OperatorId, Worker> = HashMap::new();

        tracing::info!("Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            workers.retain(|_, w| !w.is_finished());

            let operator = message.operator;
            let message = match workers.get(&operator) {
                Some(worker) => match worker.queue.send(message) {
                    Ok(()) => continue,
                    Err(mpsc::error::SendError(message)) => message,
                },
                None => message,
            };

            // The previous worker went idle; its successor waits for it to
            // drain before taking this message.
            let previous = workers.remove(&operator).map(|w| w.handle);
            let worker = self.spawn_operator_worker(operator, previous);
            let _ = worker.queue.send(message);
            workers.insert(operator, worker);
        }

        tracing::info!("Bot shutting down...");
        drop(workers);
        self.broadcast.shutdown().await;
        self.channels.shutdown_all().await?;
        Ok(())
    }

    fn spawn_operator_worker(
        &self,
        operator: OperatorId,
        previous: Option<JoinHandle<()>>,
    ) -> Worker {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let dispatcher = Arc::clone(&self.dispatcher);
        let channels = Arc::clone(&self.channels);

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            loop {
                let message = tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(m) => m,
                        None => break,
                    },
                    _ = tokio::time::sleep(WORKER_IDLE_TIMEOUT) => {
                        rx.close();
                        while let Some(message) = rx.recv().await {
                            serve(&dispatcher, &channels, operator, message).await;
                        }
                        tracing::debug!(operator = %operator, "Operator worker idle, exiting");
                        break;
                    }
                };
                serve(&dispatcher, &channels, operator, message).await;
            }
        });
        Worker { queue: tx, handle }
    }
}

/// How long an operator's worker waits for a message before exiting.
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// One operator's FIFO queue and the task draining it.
struct Worker {
    queue: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn is_finished(&self) -> bool {
        self.queue.is_closed() && self.handle.is_finished()
    }
}

async fn serve(
    dispatcher: &Dispatcher,
    channels: &ChannelManager,
    operator: OperatorId,
    message: IncomingMessage,
) {
    let reply = handle_message(dispatcher, &message).await;
    if let Err(e) = channels.respond(&message, to_response(reply)).await {
        tracing::warn!(
            operator = %operator,
            channel = %message.channel,
            error = %e,
            "Failed to send reply"
        );
    }
}

/// Route one message: `/start` opens a session, everything else is an event.
pub async fn handle_message(dispatcher: &Dispatcher, message: &IncomingMessage) -> Reply {
    tracing::debug!(
        operator = %message.operator,
        channel = %message.channel,
        "Incoming message"
    );
    if message.is_session_start() {
        dispatcher.on_start(message.operator).await
    } else {
        dispatcher.on_event(message.operator, &message.content).await
    }
}

pub fn to_response(reply: Reply) -> OutgoingResponse {
    let response = OutgoingResponse::text(reply.text);
    if reply.show_menu {
        response.with_keyboard(menu_labels())
    } else {
        response
    }
}
