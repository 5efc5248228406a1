use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use lgw_common::Points;

use crate::db_types::{Order, OrderNumber, OrderStatus};

//--------------------------------------    PendingOrder     ---------------------------------------------------------
/// The updater's in-memory snapshot of an order whose status is still non-terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub number: OrderNumber,
    pub user_id: i64,
    pub status: OrderStatus,
    pub accrual: Option<Points>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for PendingOrder {
    fn from(order: Order) -> Self {
        Self {
            number: order.number,
            user_id: order.user_id,
            status: order.status,
            accrual: None,
            uploaded_at: order.uploaded_at,
        }
    }
}

//--------------------------------------   StatusTransition   --------------------------------------------------------
/// A status change observed by the poller, queued for batched persistence. `order` is the snapshot as it was
/// *before* the change, so a failed flush can put it back and have the poller re-observe the transition.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub order: PendingOrder,
    pub new_status: OrderStatus,
    pub accrual: Option<Points>,
}

impl StatusTransition {
    /// The row state this transition wants persisted.
    pub fn updated_order(&self) -> Order {
        Order {
            number: self.order.number.clone(),
            user_id: self.order.user_id,
            status: self.new_status,
            accrual: self.accrual.or(self.order.accrual).unwrap_or_default(),
            uploaded_at: self.order.uploaded_at,
        }
    }
}

//--------------------------------------    PendingOrders     --------------------------------------------------------
/// The set of orders the updater is tracking, keyed by order number (each number appears at most once).
///
/// Mutated by `submit` and by the poller; the batch writer re-inserts entries when a flush fails. All access goes
/// through the internal mutex; iteration happens on a snapshot.
#[derive(Debug, Clone, Default)]
pub struct PendingOrders {
    inner: Arc<Mutex<HashMap<OrderNumber, PendingOrder>>>,
}

impl PendingOrders {
    fn lock(&self) -> MutexGuard<'_, HashMap<OrderNumber, PendingOrder>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts tracking `order`. Returns false (and changes nothing) when the number is already tracked.
    pub fn insert(&self, order: PendingOrder) -> bool {
        let mut set = self.lock();
        if set.contains_key(&order.number) {
            return false;
        }
        set.insert(order.number.clone(), order);
        true
    }

    /// Puts an entry back, overwriting whatever is tracked under its number. Used by the batch writer to rewind an
    /// order to its pre-transition state after a failed flush.
    pub fn reinstate(&self, order: PendingOrder) {
        self.lock().insert(order.number.clone(), order);
    }

    pub fn remove(&self, number: &OrderNumber) -> Option<PendingOrder> {
        self.lock().remove(number)
    }

    /// Records the state the poller last observed for a tracked order. A no-op when the entry has been removed in
    /// the meantime.
    pub fn set_state(&self, number: &OrderNumber, status: OrderStatus, accrual: Option<Points>) {
        if let Some(entry) = self.lock().get_mut(number) {
            entry.status = status;
            entry.accrual = accrual;
        }
    }

    pub fn snapshot(&self) -> Vec<PendingOrder> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, number: &OrderNumber) -> bool {
        self.lock().contains_key(number)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
