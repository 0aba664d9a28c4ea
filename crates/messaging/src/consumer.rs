//! Bounded worker pool fed by a single poll loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use metrics::counter;
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerMessage, ConsumerClient};
use crate::config::ConsumerConfig;
use crate::error::{HandlerError, MessagingError, Result};
use crate::handler::MessageHandler;
use crate::shutdown::Shutdown;

type WorkQueue = Arc<Mutex<mpsc::Receiver<BrokerMessage>>>;

/// Consumes a set of topics with `workers` concurrent handlers.
///
/// The poll loop never blocks on the workers: when the queue is full the
/// message is dropped with a warning. Offsets are committed by the client
/// on read, so a dropped message is not redelivered to this group.
pub struct ConsumerPool<C: ConsumerClient> {
    client: Arc<C>,
    config: ConsumerConfig,
}

impl<C: ConsumerClient> ConsumerPool<C> {
    pub fn new(client: C, config: ConsumerConfig) -> Self {
        Self {
            client: Arc::new(client),
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Runs until `shutdown` fires, then waits for in-flight handlers and
    /// closes the client.
    #[tracing::instrument(skip_all, fields(group = %self.config.group_id))]
    pub async fn run(
        self,
        shutdown: Shutdown,
        topics: Vec<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()> {
        self.client.subscribe(&topics)?;

        let (queue, receiver) = mpsc::channel(self.config.queue_capacity);
        let receiver: WorkQueue = Arc::new(Mutex::new(receiver));
        let workers: Vec<JoinHandle<()>> = (0..self.config.workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&handler),
                    self.config.handle_timeout,
                    shutdown.clone(),
                ))
            })
            .collect();

        info!(
            ?topics,
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            "Consumer pool started"
        );

        self.poll_loop(&queue, &shutdown).await;

        drop(queue);
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Consumer worker panicked");
            }
        }
        self.client.close().await;
        info!("Consumer pool stopped");
        Ok(())
    }

    async fn poll_loop(&self, queue: &mpsc::Sender<BrokerMessage>, shutdown: &Shutdown) {
        let poll_timeout = self.config.poll_timeout;
        loop {
            let polled = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                polled = self.client.poll(poll_timeout) => polled,
            };

            match polled {
                Ok(Some(message)) => match queue.try_send(message) {
                    Ok(()) => {}
                    Err(TrySendError::Full(message)) => {
                        counter!("messaging_messages_dropped_total", "topic" => message.topic.clone())
                            .increment(1);
                        warn!(
                            topic = %message.topic,
                            partition = message.partition,
                            offset = message.offset,
                            "Worker queue full, dropping message"
                        );
                    }
                    Err(TrySendError::Closed(_)) => break,
                },
                Ok(None) => {}
                Err(MessagingError::Closed) => break,
                Err(e) => {
                    warn!(error = %e, "Poll failed");
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(poll_timeout) => {}
                    }
                }
            }
        }
        debug!("Poll loop stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: WorkQueue,
    handler: Arc<dyn MessageHandler>,
    handle_timeout: Option<Duration>,
    shutdown: Shutdown,
) {
    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.wait() => None,
                message = queue.recv() => message,
            }
        };
        let Some(message) = next else {
            break;
        };

        if let Err(e) = dispatch(handler.as_ref(), &message, handle_timeout).await {
            counter!("messaging_handler_failures_total", "topic" => message.topic.clone())
                .increment(1);
            error!(
                worker_id,
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Failed to handle message"
            );
        }
    }
    debug!(worker_id, "Worker stopped");
}

async fn dispatch(
    handler: &dyn MessageHandler,
    message: &BrokerMessage,
    handle_timeout: Option<Duration>,
) -> std::result::Result<(), HandlerError> {
    let guarded = AssertUnwindSafe(handler.handle(message)).catch_unwind();
    let outcome = match handle_timeout {
        Some(limit) => tokio::time::timeout(limit, guarded)
            .await
            .map_err(|_| HandlerError::Timeout(limit))?,
        None => guarded.await,
    };
    outcome.unwrap_or(Err(HandlerError::Panicked))
}
