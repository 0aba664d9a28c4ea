//! Inventory service: stock checks, reservations and their finalization.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use common::{OrderId, ProductId, UserId};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use crate::config::InventoryConfig;
use crate::error::{InventoryError, Result};
use crate::ledger::ReservationLedger;
use crate::models::{Category, Product, ProductPage, ProductQuery, StockItem, StockRecord};
use crate::publisher::StockEventsPublisher;
use crate::repository::InventoryRepository;

/// Availability of one requested item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCheckResult {
    pub product_id: ProductId,
    pub requested_quantity: u32,
    pub available_quantity: u32,
    pub is_available: bool,
}

/// Result of a read-only stock check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCheck {
    pub results: Vec<StockCheckResult>,
    pub all_available: bool,
}

/// One item that could not be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortage {
    pub product_id: ProductId,
    pub requested_quantity: u32,
    pub reason: String,
}

/// What a reservation attempt actually held.
///
/// Reservation is not all-or-nothing: items that could be reserved stay
/// reserved under the order even when others failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationOutcome {
    pub reserved: Vec<StockItem>,
    pub failed: Vec<StockShortage>,
}

impl ReservationOutcome {
    /// Every requested item was reserved.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_products(&self) -> Vec<ProductId> {
        self.failed.iter().map(|s| s.product_id.clone()).collect()
    }
}

/// Owns the reservation ledger and drives stock records through
/// reserve, commit and release.
#[derive(Clone)]
pub struct InventoryService {
    repo: Arc<dyn InventoryRepository>,
    ledger: Arc<ReservationLedger>,
    publisher: Option<StockEventsPublisher>,
    reservation_ttl: Duration,
}

impl InventoryService {
    pub fn new(repo: Arc<dyn InventoryRepository>, config: InventoryConfig) -> Self {
        Self {
            repo,
            ledger: Arc::new(ReservationLedger::new()),
            publisher: None,
            reservation_ttl: config.reservation_ttl,
        }
    }

    /// Publishes reservation outcomes through `publisher`.
    pub fn with_publisher(mut self, publisher: StockEventsPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn reservation_ttl(&self) -> Duration {
        self.reservation_ttl
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    pub async fn get_product(&self, id: &ProductId) -> Result<Product> {
        self.repo.get_product(id).await
    }

    pub async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage> {
        self.repo.list_products(query).await
    }

    /// Available quantity of one product.
    pub async fn get_stock_quantity(&self, product_id: &ProductId) -> Result<u32> {
        Ok(self.repo.get_stock(product_id).await?.available_quantity())
    }

    pub async fn get_stock(&self, product_id: &ProductId) -> Result<StockRecord> {
        self.repo.get_stock(product_id).await
    }

    pub async fn get_stocks_by_ids(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockRecord>> {
        self.repo.get_stocks_by_ids(product_ids).await
    }

    pub async fn get_categories(&self, active_only: bool) -> Result<Vec<Category>> {
        self.repo.get_categories(active_only).await
    }

    /// Reports availability per item without touching stock.
    ///
    /// Unknown products count as zero available.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn check_stock(&self, items: &[StockItem]) -> Result<StockCheck> {
        let mut unique: Vec<ProductId> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.contains(&item.product_id) {
                unique.push(item.product_id.clone());
            }
        }
        let stocks = self.repo.get_stocks_by_ids(&unique).await?;

        let results: Vec<StockCheckResult> = items
            .iter()
            .map(|item| {
                let available = stocks
                    .get(&item.product_id)
                    .map(StockRecord::available_quantity)
                    .unwrap_or(0);
                StockCheckResult {
                    product_id: item.product_id.clone(),
                    requested_quantity: item.quantity,
                    available_quantity: available,
                    is_available: stocks.contains_key(&item.product_id)
                        && available >= item.quantity,
                }
            })
            .collect();
        let all_available = results.iter().all(|r| r.is_available);

        Ok(StockCheck {
            results,
            all_available,
        })
    }

    /// Reserves each item for `order_id` and records what succeeded.
    ///
    /// A second call for an order with a live reservation fails with
    /// [`InventoryError::DuplicateReservation`] and changes nothing. The
    /// reservation event is published best-effort.
    ///
    /// The work runs on its own task: once started it always reaches the
    /// ledger, even if the caller stops waiting.
    #[tracing::instrument(skip(self, order_id, items), fields(order_id = %order_id, items = items.len()))]
    pub async fn reserve_stock(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        items: &[StockItem],
    ) -> Result<ReservationOutcome> {
        self.reserve_with_rejections(order_id, user_id, items, Vec::new())
            .await
    }

    /// Like [`reserve_stock`](Self::reserve_stock), with lines the caller
    /// already refused reported as failed products.
    pub(crate) async fn reserve_with_rejections(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        items: &[StockItem],
        rejected: Vec<StockShortage>,
    ) -> Result<ReservationOutcome> {
        let service = self.clone();
        let order_id = order_id.clone();
        let user_id = user_id.clone();
        let items = items.to_vec();
        let task = tokio::spawn(
            async move {
                service
                    .apply_reservation(&order_id, &user_id, &items, rejected)
                    .await
            }
            .in_current_span(),
        );
        task.await
            .map_err(|e| InventoryError::TaskFailed(e.to_string()))?
    }

    async fn apply_reservation(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        items: &[StockItem],
        rejected: Vec<StockShortage>,
    ) -> Result<ReservationOutcome> {
        let claim = match self.ledger.claim(order_id) {
            Ok(claim) => claim,
            Err(e) => {
                counter!("inventory_reservations_total", "outcome" => "duplicate").increment(1);
                return Err(e);
            }
        };

        let mut outcome = ReservationOutcome {
            reserved: Vec::new(),
            failed: rejected,
        };
        for item in items {
            match self.repo.reserve(&item.product_id, item.quantity).await {
                Ok(()) => outcome.reserved.push(item.clone()),
                Err(e) => {
                    debug!(product_id = %item.product_id, error = %e, "Item not reserved");
                    outcome.failed.push(StockShortage {
                        product_id: item.product_id.clone(),
                        requested_quantity: item.quantity,
                        reason: e.to_string(),
                    });
                }
            }
        }

        claim.record(outcome.reserved.clone(), |generation| {
            self.arm_expiry(order_id, generation)
        });

        let label = match (outcome.reserved.is_empty(), outcome.failed.is_empty()) {
            (_, true) => "reserved",
            (false, false) => "partial",
            (true, false) => "failed",
        };
        counter!("inventory_reservations_total", "outcome" => label).increment(1);

        if outcome.is_complete() {
            info!(reserved = outcome.reserved.len(), "Stock reserved");
        } else {
            warn!(
                reserved = outcome.reserved.len(),
                failed = ?outcome.failed_products(),
                "Stock reservation incomplete"
            );
        }
        self.publish_outcome(order_id, user_id, &outcome);

        Ok(outcome)
    }

    /// Commits (`success`) or releases the order's reservation.
    ///
    /// A missing entry is a no-op, so redelivery and expiry races are
    /// harmless. Per-item failures are collected; every item is attempted.
    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn finalize_reservation(&self, order_id: &OrderId, success: bool) -> Result<()> {
        let Some(items) = self.ledger.take(order_id) else {
            debug!("No active reservation to finalize");
            return Ok(());
        };

        let mut errors = Vec::new();
        for item in &items {
            let applied = if success {
                self.repo.commit(&item.product_id, item.quantity).await
            } else {
                self.repo.release(&item.product_id, item.quantity).await
            };
            if let Err(e) = applied {
                warn!(product_id = %item.product_id, error = %e, "Finalize step failed");
                errors.push(e);
            }
        }

        info!(
            items = items.len(),
            committed = success,
            failures = errors.len(),
            "Reservation finalized"
        );
        InventoryError::aggregate(errors)
    }

    /// Releases the given quantities, independent of the ledger.
    #[tracing::instrument(skip(self, order_id, items), fields(order_id = %order_id, items = items.len()))]
    pub async fn release_stock(&self, order_id: &OrderId, items: &[StockItem]) -> Result<()> {
        let errors = release_all(self.repo.as_ref(), items).await;
        if errors.is_empty() {
            info!("Stock released");
        }
        InventoryError::aggregate(errors)
    }

    fn arm_expiry(&self, order_id: &OrderId, generation: u64) -> Option<JoinHandle<()>> {
        if self.reservation_ttl.is_zero() {
            return None;
        }
        let ttl = self.reservation_ttl;
        let ledger = Arc::downgrade(&self.ledger);
        let repo = Arc::clone(&self.repo);
        let order_id = order_id.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            expire_reservation(ledger, repo, order_id, generation).await;
        }))
    }

    fn publish_outcome(&self, order_id: &OrderId, user_id: &UserId, outcome: &ReservationOutcome) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        let published = if outcome.is_complete() {
            publisher.publish_stock_reserved(order_id, user_id)
        } else {
            publisher.publish_stock_reservation_failed(
                order_id,
                user_id,
                &outcome.failed_products(),
            )
        };
        if let Err(e) = published {
            warn!(order_id = %order_id, error = %e, "Failed to publish reservation outcome");
        }
    }
}

async fn release_all(repo: &dyn InventoryRepository, items: &[StockItem]) -> Vec<InventoryError> {
    let mut errors = Vec::new();
    for item in items {
        if let Err(e) = repo.release(&item.product_id, item.quantity).await {
            warn!(product_id = %item.product_id, error = %e, "Release failed");
            errors.push(e);
        }
    }
    errors
}

async fn expire_reservation(
    ledger: Weak<ReservationLedger>,
    repo: Arc<dyn InventoryRepository>,
    order_id: OrderId,
    generation: u64,
) {
    let Some(ledger) = ledger.upgrade() else {
        return;
    };
    let Some(items) = ledger.take_expired(&order_id, generation) else {
        return;
    };
    drop(ledger);

    let errors = release_all(repo.as_ref(), &items).await;
    counter!("inventory_reservations_expired_total").increment(1);
    info!(
        order_id = %order_id,
        items = items.len(),
        failures = errors.len(),
        "Reservation expired and released"
    );
}
