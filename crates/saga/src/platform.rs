//! Assembles the services and the consumer pools that connect them.
//!
//! Nothing here orchestrates: each service reacts to the events it consumes
//! and publishes its own outcome. The platform only owns the plumbing, and
//! tears it down in order (consumers first, then publishers).

use std::sync::Arc;
use std::time::Duration;

use events::{Event, OrderCreated, PaymentProcessed, StockReserved};
use inventory::{InMemoryInventoryRepository, InventoryRepository, InventoryService, StockEventsPublisher};
use messaging::{
    ConsumerPool, MessageHandler, Publisher, Shutdown, ShutdownTrigger, shutdown_channel, typed,
};
use orders::{InMemoryOrderRepository, OrderEventsPublisher, OrderRepository, OrderService};
use payments::{
    MockDecision, MockPaymentProcessor, OrderTotalsCache, PaymentEventsPublisher,
    PaymentProcessor, PaymentService, StockReservedHandler,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PlatformConfig;
use crate::connector::BrokerConnector;
use crate::error::{PlatformError, Result};

pub const INVENTORY_GROUP: &str = "inventory-service";
pub const ORDER_GROUP: &str = "order-service";
pub const PAYMENT_GROUP: &str = "payment-service";

const TOTALS_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Storage and processor backends the services run on.
pub struct Backends {
    pub inventory: Arc<dyn InventoryRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub payment_processor: Arc<dyn PaymentProcessor>,
}

impl Backends {
    /// In-memory stores with the demo catalog and a processor that approves
    /// every charge.
    pub fn in_memory() -> Self {
        Self {
            inventory: Arc::new(InMemoryInventoryRepository::with_sample_catalog()),
            orders: Arc::new(InMemoryOrderRepository::new()),
            payment_processor: Arc::new(MockPaymentProcessor::new(MockDecision::ApproveAll)),
        }
    }
}

struct PoolTask {
    group: &'static str,
    topic: &'static str,
    task: JoinHandle<messaging::Result<()>>,
}

/// The running order, inventory and payment services.
pub struct FulfillmentPlatform<B: BrokerConnector> {
    inventory: InventoryService,
    orders: OrderService,
    payments: PaymentService,
    order_totals: OrderTotalsCache,
    publishers: Vec<(&'static str, Arc<Publisher<B::Producer>>)>,
    pools: Vec<PoolTask>,
    janitor: JoinHandle<()>,
    shutdown: ShutdownTrigger,
}

impl<B: BrokerConnector> FulfillmentPlatform<B> {
    /// Builds every service and starts one consumer pool per
    /// (service, topic) pair. Must be called inside a Tokio runtime.
    ///
    /// If a client cannot be created, pools already started stop on their
    /// own when the half-built platform is dropped.
    #[tracing::instrument(skip_all)]
    pub fn start(connector: &B, backends: Backends, config: PlatformConfig) -> Result<Self> {
        let flush_timeout = config.messaging.publisher.flush_timeout;
        let inventory_publisher = Arc::new(Publisher::new(connector.producer()?, flush_timeout)?);
        let order_publisher = Arc::new(Publisher::new(connector.producer()?, flush_timeout)?);
        let payment_publisher = Arc::new(Publisher::new(connector.producer()?, flush_timeout)?);

        let inventory = InventoryService::new(backends.inventory, config.inventory.clone())
            .with_publisher(StockEventsPublisher::new(inventory_publisher.clone()));
        let orders = OrderService::new(backends.orders)
            .with_publisher(OrderEventsPublisher::new(order_publisher.clone()));
        let payments = PaymentService::new(backends.payment_processor);
        let order_totals = OrderTotalsCache::new();

        let subscriptions: Vec<(&'static str, &'static str, Arc<dyn MessageHandler>)> = vec![
            (
                INVENTORY_GROUP,
                OrderCreated::TOPIC,
                typed::<OrderCreated, _>(inventory::OrderCreatedHandler::new(inventory.clone())),
            ),
            (
                INVENTORY_GROUP,
                PaymentProcessed::TOPIC,
                typed::<PaymentProcessed, _>(inventory::PaymentProcessedHandler::new(
                    inventory.clone(),
                )),
            ),
            (
                ORDER_GROUP,
                PaymentProcessed::TOPIC,
                typed::<PaymentProcessed, _>(orders::PaymentProcessedHandler::new(orders.clone())),
            ),
            (
                PAYMENT_GROUP,
                OrderCreated::TOPIC,
                typed::<OrderCreated, _>(payments::OrderCreatedHandler::new(
                    order_totals.clone(),
                    config.payment.clone(),
                )),
            ),
            (
                PAYMENT_GROUP,
                StockReserved::TOPIC,
                typed::<StockReserved, _>(
                    StockReservedHandler::new(
                        payments.clone(),
                        order_totals.clone(),
                        config.payment.clone(),
                    )
                    .with_publisher(PaymentEventsPublisher::new(payment_publisher.clone())),
                ),
            ),
        ];

        let (shutdown, signal) = shutdown_channel();
        let mut pools = Vec::with_capacity(subscriptions.len());
        for (group, topic, handler) in subscriptions {
            let consumer_config = config.messaging.consumer.with_group(group);
            let client = connector.consumer(&consumer_config)?;
            let pool = ConsumerPool::new(client, consumer_config);
            let task = tokio::spawn(pool.run(signal.clone(), vec![topic.to_string()], handler));
            pools.push(PoolTask { group, topic, task });
        }
        let janitor = spawn_totals_janitor(order_totals.clone(), signal);

        info!(pools = pools.len(), "Fulfillment platform started");
        Ok(Self {
            inventory,
            orders,
            payments,
            order_totals,
            publishers: vec![
                ("inventory", inventory_publisher),
                ("orders", order_publisher),
                ("payments", payment_publisher),
            ],
            pools,
            janitor,
            shutdown,
        })
    }

    pub fn inventory(&self) -> &InventoryService {
        &self.inventory
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }

    pub fn order_totals(&self) -> &OrderTotalsCache {
        &self.order_totals
    }

    /// Stops the consumer pools, waits for their in-flight handlers, then
    /// flushes and closes the publishers.
    ///
    /// Every step runs even if an earlier one failed; the first failure is
    /// returned.
    #[tracing::instrument(skip_all)]
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down fulfillment platform");
        self.shutdown.trigger();

        let mut first_error: Option<PlatformError> = None;
        for PoolTask { group, topic, task } in self.pools {
            let failure = match task.await {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => PlatformError::Pool {
                    group: group.to_string(),
                    topic: topic.to_string(),
                    source,
                },
                Err(e) => PlatformError::PoolAborted {
                    group: group.to_string(),
                    topic: topic.to_string(),
                    reason: e.to_string(),
                },
            };
            error!(error = %failure, "Consumer pool did not stop cleanly");
            first_error.get_or_insert(failure);
        }

        if let Err(e) = self.janitor.await {
            warn!(error = %e, "Order totals janitor failed");
        }

        for (service, publisher) in &self.publishers {
            if let Err(e) = publisher.close().await {
                warn!(service, error = %e, "Publisher did not close cleanly");
                first_error.get_or_insert(e.into());
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Fulfillment platform stopped");
                Ok(())
            }
        }
    }
}

fn spawn_totals_janitor(totals: OrderTotalsCache, shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TOTALS_PURGE_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    let purged = totals.purge_expired();
                    if purged > 0 {
                        debug!(purged, "Expired order totals purged");
                    }
                }
            }
        }
    })
}
