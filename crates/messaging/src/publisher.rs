//! Non-blocking publisher with a background delivery drain.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use events::Event;
use metrics::counter;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broker::{DeliveryReport, DeliveryReports, OutboundRecord, ProducerClient};
use crate::error::{MessagingError, Result};
use crate::shutdown::{Shutdown, ShutdownTrigger, shutdown_channel};

/// Anything services can hand encoded events to.
///
/// Services depend on this rather than on [`Publisher`] so tests can record
/// or fail publishes without a broker.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<()>;
}

/// Encodes typed events onto their own topic, keyed by partition key.
pub trait EventPublisherExt: EventPublisher {
    fn publish_event<E: Event>(&self, event: &E) -> Result<()> {
        self.publish(E::TOPIC, Some(event.partition_key()), event.to_bytes())
    }
}

impl<T: EventPublisher + ?Sized> EventPublisherExt for T {}

/// Publisher over any [`ProducerClient`].
///
/// `publish` only enqueues. Broker acknowledgements are consumed by a single
/// drain task which logs them; delivery failures never reach the caller.
pub struct Publisher<P: ProducerClient> {
    client: Arc<P>,
    flush_timeout: Duration,
    drain_stop: ShutdownTrigger,
    drain_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<P: ProducerClient> Publisher<P> {
    /// Takes the client's delivery reports and starts the drain task.
    pub fn new(client: P, flush_timeout: Duration) -> Result<Self> {
        let reports = client
            .take_delivery_reports()
            .ok_or(MessagingError::ReportsTaken)?;
        let (drain_stop, stop) = shutdown_channel();
        let drain_task = tokio::spawn(drain_delivery_reports(reports, stop));

        Ok(Self {
            client: Arc::new(client),
            flush_timeout,
            drain_stop,
            drain_task: Mutex::new(Some(drain_task)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn client(&self) -> &P {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flushes outstanding records, stops the drain task and closes the
    /// client, in that order. Later calls return `Ok(())` immediately.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let remaining = self.client.flush(self.flush_timeout).await;
        if remaining > 0 {
            warn!(
                remaining,
                timeout_ms = self.flush_timeout.as_millis() as u64,
                "Publisher closed with undelivered messages"
            );
        }

        self.drain_stop.trigger();
        let drain_task = self.drain_task.lock().take();
        if let Some(drain_task) = drain_task
            && let Err(e) = drain_task.await
        {
            error!(error = %e, "Delivery drain task failed");
        }

        self.client.close().await;
        info!("Publisher closed");

        if remaining > 0 {
            return Err(MessagingError::FlushTimeout { remaining });
        }
        Ok(())
    }
}

impl<P: ProducerClient> EventPublisher for Publisher<P> {
    fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(MessagingError::Closed);
        }
        self.client
            .enqueue(OutboundRecord::new(topic, key, payload))?;
        counter!("messaging_messages_published_total", "topic" => topic.to_string()).increment(1);
        Ok(())
    }
}

async fn drain_delivery_reports(mut reports: DeliveryReports, stop: Shutdown) {
    loop {
        tokio::select! {
            report = reports.recv() => match report {
                Some(report) => log_report(&report),
                None => return,
            },
            _ = stop.wait() => break,
        }
    }

    while let Ok(report) = reports.try_recv() {
        log_report(&report);
    }
    debug!("Delivery drain stopped");
}

fn log_report(report: &DeliveryReport) {
    match &report.error {
        None => debug!(
            topic = %report.topic,
            partition = report.partition,
            offset = report.offset,
            "Message delivered"
        ),
        Some(e) => {
            counter!("messaging_delivery_failures_total", "topic" => report.topic.clone())
                .increment(1);
            error!(
                topic = %report.topic,
                partition = report.partition,
                offset = report.offset,
                error = %e,
                "Message delivery failed"
            );
        }
    }
}
