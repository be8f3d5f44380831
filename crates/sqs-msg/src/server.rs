//! Consumer loop with a bounded concurrency gate and cooperative shutdown.
//!
//! A [`Server`] long-polls its queue for batches and hands each message to a
//! [`Receiver`] on its own task. At most `max_concurrency` handler tasks run
//! at once: the loop acquires a gate slot before spawning, so a saturated gate
//! stalls polling rather than buffering work.
//!
//! Handler outcomes become queue operations:
//!
//! - success: the message is deleted
//! - failure: the message's visibility timeout is set to the configured retry
//!   timeout so it is redelivered sooner
//!
//! Failures of either follow-up call are logged and otherwise ignored; a
//! message that could not be deleted is redelivered once its visibility
//! window expires.
//!
//! # Shutdown
//!
//! Two lifetimes govern a server. Cancelling the *server* lifetime stops new
//! receive calls and dispatches, but handlers already running are left to
//! finish. The *receiver* lifetime is the token handed to every handler; it is
//! only cancelled when [`Server::shutdown`] runs out of time. Handlers that
//! ignore it keep running, and keep their gate slot, after shutdown returns.
//!
//! ```no_run
//! use sqs_msg::{Message, QueueUrl, Server, ServerConfig, SqsConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue_url = QueueUrl::new("https://sqs.us-west-2.amazonaws.com/123456789012/orders")?;
//! let server = Arc::new(Server::connect(
//!     &SqsConfig::from_env()?,
//!     ServerConfig::new(queue_url, 8, 30),
//! )?);
//!
//! let serving = {
//!     let server = Arc::clone(&server);
//!     tokio::spawn(async move {
//!         server
//!             .serve(Arc::new(|_ctx: CancellationToken, message: Message| async move {
//!                 println!("{} bytes", message.body.len());
//!                 Ok::<(), anyhow::Error>(())
//!             }))
//!             .await
//!     })
//! };
//!
//! tokio::signal::ctrl_c().await?;
//! server
//!     .shutdown(tokio::time::Instant::now() + Duration::from_secs(10))
//!     .await?;
//! serving.await??;
//! # Ok(())
//! # }
//! ```

use crate::client::QueueClient;
use crate::config::{ServerConfig, SqsConfig, MAX_CONCURRENCY};
use crate::error::{QueueError, ServerError};
use crate::message::{Message, MessageId, QueueUrl, ReceiveRequest, ReceivedMessage};
use crate::providers::SqsClient;
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

// ============================================================================
// Receiver
// ============================================================================

/// Message handler invoked by the consumer loop
///
/// `ctx` is the receiver lifetime. It is cancelled only when shutdown misses
/// its deadline; long-running handlers should watch it and give up early.
/// Returning an error schedules the message for redelivery.
#[async_trait]
pub trait Receiver: Send + Sync {
    async fn receive(&self, ctx: CancellationToken, message: Message) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Receiver for F
where
    F: Fn(CancellationToken, Message) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn receive(&self, ctx: CancellationToken, message: Message) -> anyhow::Result<()> {
        (self)(ctx, message).await
    }
}

// ============================================================================
// Server
// ============================================================================

/// Outcome of an orderly stop of the consumer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerClosed;

impl std::fmt::Display for ServerClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "server closed")
    }
}

/// Lifecycle of the consumer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Polling and dispatching
    Running,
    /// Shutdown observed; no further receive calls or dispatches
    Draining,
    /// The loop has exited
    Closed,
}

/// Queue consumer with bounded handler concurrency
pub struct Server {
    client: Arc<dyn QueueClient>,
    config: ServerConfig,
    max_concurrency: usize,
    gate: Arc<Semaphore>,
    server_lifetime: CancellationToken,
    receiver_lifetime: CancellationToken,
    state: Mutex<ServerState>,
    polling: AtomicBool,
}

impl Server {
    /// Create a server over an existing queue client
    ///
    /// A `max_concurrency` below 1 is raised to 1 and one above
    /// [`MAX_CONCURRENCY`] is lowered to it.
    pub fn new(client: Arc<dyn QueueClient>, config: ServerConfig) -> Self {
        let max_concurrency = if config.max_concurrency < 1 {
            warn!(
                requested = config.max_concurrency,
                "max_concurrency must be at least 1; using 1"
            );
            1
        } else if config.max_concurrency > MAX_CONCURRENCY {
            warn!(
                requested = config.max_concurrency,
                limit = MAX_CONCURRENCY,
                "max_concurrency exceeds the gate limit; clamping"
            );
            MAX_CONCURRENCY
        } else {
            config.max_concurrency
        };

        Self {
            client,
            max_concurrency,
            gate: Arc::new(Semaphore::new(max_concurrency)),
            server_lifetime: CancellationToken::new(),
            receiver_lifetime: CancellationToken::new(),
            state: Mutex::new(ServerState::Running),
            polling: AtomicBool::new(false),
            config,
        }
    }

    /// Create a server backed by an [`SqsClient`] that retries credential
    /// failures as configured in `config.credential_retry`
    pub fn connect(sqs: &SqsConfig, config: ServerConfig) -> Result<Self, QueueError> {
        config.validate()?;

        let client = SqsClient::new(sqs)?
            .with_retry_policy(Arc::new(config.credential_retry.policy()));

        Ok(Self::new(Arc::new(client), config))
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of handler invocations currently holding a gate slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.gate.available_permits()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn queue_url(&self) -> &QueueUrl {
        &self.config.queue_url
    }

    fn set_state(&self, state: ServerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Run the consumer loop until shutdown or a receive failure
    ///
    /// Returns `Ok(ServerClosed)` once [`shutdown`](Self::shutdown) has been
    /// requested. Handlers still running at that point are not awaited here.
    ///
    /// # Errors
    ///
    /// [`ServerError::Receive`] when a receive call fails. The queue client has
    /// already applied its retry policy, so the loop does not retry.
    pub async fn serve(&self, receiver: Arc<dyn Receiver>) -> Result<ServerClosed, ServerError> {
        self.polling.store(true, Ordering::SeqCst);
        let outcome = self.run(receiver).await;
        self.polling.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run(&self, receiver: Arc<dyn Receiver>) -> Result<ServerClosed, ServerError> {
        info!(
            queue_url = %self.config.queue_url,
            max_concurrency = self.max_concurrency,
            "Consumer loop started"
        );

        loop {
            if self.server_lifetime.is_cancelled() {
                return Ok(self.drain());
            }

            let request = ReceiveRequest::all_attributes(
                self.config.queue_url.clone(),
                self.config.max_messages,
                self.config.wait_time_seconds,
            );

            let batch = match self.client.receive_messages(request).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(
                        queue_url = %self.config.queue_url,
                        error = %e,
                        "Receive failed; stopping consumer loop"
                    );
                    self.set_state(ServerState::Closed);
                    return Err(ServerError::Receive(e));
                }
            };

            let mut pending = batch.into_iter();
            while let Some(received) = pending.next() {
                // A free slot is always used, even after shutdown was requested;
                // only a saturated gate races the server lifetime.
                let permit = match Arc::clone(&self.gate).try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => tokio::select! {
                        biased;
                        _ = self.server_lifetime.cancelled() => {
                            debug!("Shutdown requested while waiting for a free slot");
                            self.release(std::iter::once(received).chain(pending)).await;
                            return Ok(self.drain());
                        }
                        permit = Arc::clone(&self.gate).acquire_owned() => match permit {
                            Ok(permit) => permit,
                            // The gate is never closed while the loop runs
                            Err(_) => return Ok(self.drain()),
                        },
                    },
                };

                self.dispatch(received, permit, Arc::clone(&receiver));
            }
        }
    }

    /// Make undispatched messages visible again right away
    async fn release(&self, messages: impl Iterator<Item = ReceivedMessage>) {
        for received in messages {
            if let Err(e) = self
                .client
                .change_visibility(&self.config.queue_url, &received.receipt_handle, 0)
                .await
            {
                warn!(
                    message_id = %message_id(&received),
                    error = %e,
                    "Failed to release undispatched message"
                );
            }
        }
    }

    fn drain(&self) -> ServerClosed {
        self.set_state(ServerState::Draining);
        info!(
            in_flight = self.in_flight(),
            "Consumer loop draining; no further messages will be received"
        );
        self.set_state(ServerState::Closed);
        info!("Consumer loop closed");
        ServerClosed
    }

    fn dispatch(
        &self,
        received: ReceivedMessage,
        permit: OwnedSemaphorePermit,
        receiver: Arc<dyn Receiver>,
    ) {
        trace!(message_id = %message_id(&received), "Dispatching message");

        let client = Arc::clone(&self.client);
        let queue_url = self.config.queue_url.clone();
        let retry_timeout_seconds = self.config.retry_timeout_seconds;
        let ctx = self.receiver_lifetime.clone();

        tokio::spawn(async move {
            // Released on drop, including when the handler panics
            let _permit = permit;
            handle_message(
                client.as_ref(),
                &queue_url,
                retry_timeout_seconds,
                receiver.as_ref(),
                ctx,
                received,
            )
            .await;
        });
    }

    /// Stop the consumer loop and wait for running handlers
    ///
    /// The server lifetime is cancelled at once. The loop finishes the receive
    /// call it is in and dispatches what it returns. Shutdown is clean once the
    /// loop has exited and no handler holds a slot, checked at the configured
    /// poll interval. A loop still inside a long-poll at `deadline` does not
    /// count as running work.
    ///
    /// # Errors
    ///
    /// [`ServerError::DeadlineExceeded`] if handlers are still running at
    /// `deadline`. The receiver lifetime is cancelled before returning.
    pub async fn shutdown(&self, deadline: Instant) -> Result<ServerClosed, ServerError> {
        info!(in_flight = self.in_flight(), "Shutdown requested");
        self.server_lifetime.cancel();

        let mut ticker = tokio::time::interval(self.config.shutdown_poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expired = tokio::time::sleep_until(deadline);
        tokio::pin!(expired);

        loop {
            tokio::select! {
                biased;
                _ = &mut expired => {
                    let in_flight = self.in_flight();
                    if in_flight == 0 {
                        info!("Shutdown complete");
                        return Ok(ServerClosed);
                    }

                    warn!(in_flight, "Shutdown deadline exceeded; cancelling running handlers");
                    self.receiver_lifetime.cancel();
                    return Err(ServerError::DeadlineExceeded { in_flight });
                }
                _ = ticker.tick() => {
                    let in_flight = self.in_flight();
                    if in_flight == 0 && !self.polling.load(Ordering::SeqCst) {
                        info!("Shutdown complete");
                        return Ok(ServerClosed);
                    }
                    debug!(in_flight, "Waiting for running handlers");
                }
            }
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("queue_url", &self.config.queue_url)
            .field("max_concurrency", &self.max_concurrency)
            .field("in_flight", &self.in_flight())
            .field("state", &self.state())
            .finish()
    }
}

fn message_id(received: &ReceivedMessage) -> &str {
    received
        .message_id
        .as_ref()
        .map(MessageId::as_str)
        .unwrap_or("<unknown>")
}

/// Run one handler and acknowledge or reschedule its message
async fn handle_message(
    client: &dyn QueueClient,
    queue_url: &QueueUrl,
    retry_timeout_seconds: u32,
    receiver: &dyn Receiver,
    ctx: CancellationToken,
    received: ReceivedMessage,
) {
    let message = Message::from(&received);

    match receiver.receive(ctx, message).await {
        Ok(()) => {
            if let Err(e) = client
                .delete_message(queue_url, &received.receipt_handle)
                .await
            {
                error!(
                    message_id = %message_id(&received),
                    error = %e,
                    "Failed to delete processed message; it will be redelivered"
                );
            }
        }
        Err(handler_error) => {
            let cause = format!("{:#}", handler_error);
            error!(
                message_id = %message_id(&received),
                error = %cause,
                "Message handler failed"
            );

            if let Err(e) = client
                .change_visibility(queue_url, &received.receipt_handle, retry_timeout_seconds)
                .await
            {
                error!(
                    message_id = %message_id(&received),
                    retry_timeout_seconds,
                    error = %e,
                    "Failed to change message visibility"
                );
            }
        }
    }
}
