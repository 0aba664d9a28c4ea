//! Reservation ledger: which quantities are held for which order.
//!
//! Entries, in-progress claims and expiry timers live in one [`LedgerState`]
//! behind a single mutex. Finalize and expiry both remove an entry inside
//! that critical section, so only one of them ever sees the items.

use std::collections::{HashMap, HashSet};

use common::OrderId;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::{InventoryError, Result};
use crate::models::StockItem;

#[derive(Debug)]
struct LedgerEntry {
    items: Vec<StockItem>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: HashMap<OrderId, LedgerEntry>,
    /// Orders whose reservation is being applied right now.
    claims: HashSet<OrderId>,
    next_generation: u64,
}

/// In-process ledger of outstanding reservations.
#[derive(Debug, Default)]
pub struct ReservationLedger {
    state: Mutex<LedgerState>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `order_id` for a new reservation.
    ///
    /// Fails while a live entry or another claim exists for the order. The
    /// claim is dropped again if the returned guard is dropped unrecorded.
    pub fn claim(&self, order_id: &OrderId) -> Result<Claim<'_>> {
        let mut state = self.state.lock();
        if state.entries.contains_key(order_id) || !state.claims.insert(order_id.clone()) {
            return Err(InventoryError::DuplicateReservation(order_id.clone()));
        }
        Ok(Claim {
            ledger: self,
            order_id: order_id.clone(),
            settled: false,
        })
    }

    fn record(
        &self,
        order_id: &OrderId,
        items: Vec<StockItem>,
        arm_timer: impl FnOnce(u64) -> Option<JoinHandle<()>>,
    ) {
        let mut state = self.state.lock();
        state.claims.remove(order_id);
        if items.is_empty() {
            return;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let timer = arm_timer(generation);
        let previous = state.entries.insert(
            order_id.clone(),
            LedgerEntry {
                items,
                generation,
                timer,
            },
        );
        if let Some(previous) = previous.and_then(|p| p.timer) {
            previous.abort();
        }
    }

    /// Removes the entry and cancels its timer. Used by finalize.
    pub fn take(&self, order_id: &OrderId) -> Option<Vec<StockItem>> {
        let entry = self.state.lock().entries.remove(order_id)?;
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        Some(entry.items)
    }

    /// Removes the entry only if it still belongs to the expiring timer.
    pub fn take_expired(&self, order_id: &OrderId, generation: u64) -> Option<Vec<StockItem>> {
        let mut state = self.state.lock();
        match state.entries.get(order_id) {
            Some(entry) if entry.generation == generation => {
                state.entries.remove(order_id).map(|entry| entry.items)
            }
            _ => None,
        }
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.state.lock().entries.contains_key(order_id)
    }

    /// Items currently held for an order.
    pub fn items(&self, order_id: &OrderId) -> Option<Vec<StockItem>> {
        self.state
            .lock()
            .entries
            .get(order_id)
            .map(|entry| entry.items.clone())
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-progress reservation for one order.
#[derive(Debug)]
pub struct Claim<'a> {
    ledger: &'a ReservationLedger,
    order_id: OrderId,
    settled: bool,
}

impl Claim<'_> {
    /// Stores the items actually reserved; with none, the claim just ends.
    ///
    /// `arm_timer` receives the entry's generation and returns its expiry
    /// task, if any.
    pub fn record(
        mut self,
        items: Vec<StockItem>,
        arm_timer: impl FnOnce(u64) -> Option<JoinHandle<()>>,
    ) {
        self.ledger.record(&self.order_id, items, arm_timer);
        self.settled = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.ledger.state.lock().claims.remove(&self.order_id);
        }
    }
}
