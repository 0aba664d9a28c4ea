//! Message handlers: raw broker messages and typed domain events.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use events::Event;
use tracing::{error, warn};

use crate::broker::BrokerMessage;
use crate::error::{BoxError, HandlerError};

/// Processes one raw message pulled by a consumer pool worker.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: &BrokerMessage) -> Result<(), HandlerError>;
}

/// Processes one decoded domain event.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    async fn handle(&self, event: E) -> Result<(), BoxError>;
}

/// Decodes the payload as `E` before calling the inner handler.
///
/// Payloads that do not decode, or arrive on a topic other than `E::TOPIC`,
/// are logged and dropped. Redelivering them would fail the same way.
pub struct TypedHandler<E, H> {
    inner: H,
    _event: PhantomData<fn() -> E>,
}

impl<E, H> TypedHandler<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> MessageHandler for TypedHandler<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    async fn handle(&self, message: &BrokerMessage) -> Result<(), HandlerError> {
        if message.topic != E::TOPIC {
            warn!(
                topic = %message.topic,
                expected = E::TOPIC,
                offset = message.offset,
                "Message on unexpected topic dropped"
            );
            return Ok(());
        }

        let event = match E::from_bytes(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    event = E::NAME,
                    error = %e,
                    "Failed to decode message, dropping"
                );
                return Ok(());
            }
        };

        self.inner.handle(event).await.map_err(HandlerError::Failed)
    }
}

/// Wraps an [`EventHandler`] into the shape a consumer pool runs.
pub fn typed<E, H>(inner: H) -> Arc<dyn MessageHandler>
where
    E: Event,
    H: EventHandler<E>,
{
    Arc::new(TypedHandler::<E, H>::new(inner))
}

/// Adapts an async closure into an [`EventHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<E, F, Fut> EventHandler<E> for FnHandler<F>
where
    E: Event,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn handle(&self, event: E) -> Result<(), BoxError> {
        (self.0)(event).await
    }
}
