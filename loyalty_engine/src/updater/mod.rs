//! The order reconciliation engine.
//!
//! The updater tracks every order whose status is still non-terminal in an in-memory [`PendingOrders`] set and
//! runs two cooperating tasks over it:
//! * the **poller** asks the accrual service about each tracked order once per [`UpdaterConfig::poll_period`] and
//!   turns answers into [`StatusTransition`]s, and
//! * the **batch writer** collects transitions and persists them through [`LoyaltyStore::update_orders`] whenever
//!   the buffer reaches [`UpdaterConfig::batch_size`] or [`UpdaterConfig::flush_period`] elapses, whichever comes
//!   first.
//!
//! A terminal order leaves the pending set only once its transition has been accepted by the writer's queue, and a
//! failed flush puts the affected orders back, so persistence is at-least-once and reconciliation is eventual even
//! across database outages. The storage layer makes replays harmless.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::*;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{AccrualClient, AccrualOutcome, AccrualStatus},
    db_types::{Order, OrderNumber, OrderStatus},
    traits::{LoyaltyStore, StorageError},
};

mod pending;

pub use pending::{PendingOrder, PendingOrders, StatusTransition};

//--------------------------------------    UpdaterConfig     --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Cadence of the accrual polling pass.
    pub poll_period: Duration,
    /// Maximum age of a buffered transition before the writer flushes regardless of batch size.
    pub flush_period: Duration,
    /// Number of buffered transitions that triggers an immediate flush.
    pub batch_size: usize,
    /// Capacity of the poller → writer transition queue.
    pub queue_depth: usize,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_secs(1),
            flush_period: Duration::from_secs(1),
            batch_size: 5,
            queue_depth: 64,
        }
    }
}

//--------------------------------------    UpdaterError      --------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum UpdaterError {
    #[error("The updater has not been started")]
    NotStarted,
    #[error("The updater was already started")]
    AlreadyStarted,
    #[error("The updater is not running")]
    NotRunning,
    #[error("The accrual service reported an undocumented status for order {0}")]
    ProtocolError(OrderNumber),
    #[error("The accrual service failed internally while reporting on order {0}")]
    AccrualRemoteError(OrderNumber),
    #[error("The accrual service could not be reached for order {0}")]
    AccrualUnreachable(OrderNumber),
    #[error("A batch of order updates could not be persisted: {0}")]
    StorageError(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopping,
    Stopped,
}

//--------------------------------------     OrderUpdater     --------------------------------------------------------
pub struct OrderUpdater<B, C> {
    store: B,
    client: Arc<C>,
    pending: PendingOrders,
    cancel: CancellationToken,
    config: UpdaterConfig,
    state: Mutex<Lifecycle>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<B, C> OrderUpdater<B, C>
where
    B: LoyaltyStore + 'static,
    C: AccrualClient + 'static,
{
    /// `cancel` is the shared shutdown signal; it should be the same token the accrual client was built with so
    /// that cancelling it also terminates in-flight accrual requests.
    pub fn new(store: B, client: C, cancel: CancellationToken, config: UpdaterConfig) -> Self {
        Self {
            store,
            client: Arc::new(client),
            pending: PendingOrders::default(),
            cancel,
            config,
            state: Mutex::new(Lifecycle::Created),
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn state(&self) -> Lifecycle {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: Lifecycle) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    /// Launches the poller and the batch writer. Returns the channel on which both report non-fatal errors
    /// (transient accrual failures, failed flushes, protocol violations).
    pub fn start(&self) -> Result<mpsc::UnboundedReceiver<UpdaterError>, UpdaterError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if *state != Lifecycle::Created {
                return Err(UpdaterError::AlreadyStarted);
            }
            *state = Lifecycle::Running;
        }
        let (transition_tx, transition_rx) = mpsc::channel(self.config.queue_depth);
        let (err_tx, err_rx) = mpsc::unbounded_channel();

        let poller = tokio::spawn(run_poller(
            self.client.clone(),
            self.pending.clone(),
            transition_tx,
            err_tx.clone(),
            self.cancel.clone(),
            self.config.poll_period,
        ));
        let writer = tokio::spawn(run_writer(
            self.store.clone(),
            self.pending.clone(),
            transition_rx,
            err_tx,
            self.config.flush_period,
            self.config.batch_size,
        ));
        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tasks.push(poller);
        tasks.push(writer);
        info!("🔄 Order updater started");
        Ok(err_rx)
    }

    /// Cancels the shared signal and waits for the poller and writer to drain and exit. The writer attempts a
    /// final flush on the way out; its outcome is reported on the error channel.
    pub async fn stop(&self) -> Result<(), UpdaterError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if *state != Lifecycle::Running {
                return Err(UpdaterError::NotRunning);
            }
            *state = Lifecycle::Stopping;
        }
        info!("🔄 Order updater stopping");
        self.cancel.cancel();
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            if let Err(e) = task.await {
                error!("🔄 Updater task ended abnormally: {e}");
            }
        }
        self.set_state(Lifecycle::Stopped);
        info!("🔄 Order updater stopped");
        Ok(())
    }

    /// Starts tracking a freshly uploaded order. Idempotent on the order number; submitting an already-tracked
    /// order is a no-op. Calling this before `start` is a programming error and is rejected.
    pub fn submit(&self, order: Order) -> Result<(), UpdaterError> {
        if self.state() != Lifecycle::Running {
            return Err(UpdaterError::NotStarted);
        }
        if order.status.is_terminal() {
            debug!("🔄 Order [{}] is already {}; nothing to track", order.number, order.status);
            return Ok(());
        }
        let number = order.number.clone();
        if self.pending.insert(PendingOrder::from(order)) {
            trace!("🔄 Tracking order [{number}]");
        } else {
            debug!("🔄 Order [{number}] is already tracked");
        }
        Ok(())
    }

    pub fn submit_many(&self, orders: Vec<Order>) -> Result<(), UpdaterError> {
        for order in orders {
            self.submit(order)?;
        }
        Ok(())
    }

    /// Number of orders currently awaiting reconciliation.
    pub fn tracked_orders(&self) -> usize {
        self.pending.len()
    }
}

/// The slice of the updater that request handlers see: hand over a freshly stored order, nothing more. Keeping
/// this object-safe lets the HTTP layer hold one `Arc<dyn OrderSink>` regardless of the backend and client types
/// behind it.
pub trait OrderSink: Send + Sync {
    fn submit(&self, order: Order) -> Result<(), UpdaterError>;

    fn submit_many(&self, orders: Vec<Order>) -> Result<(), UpdaterError>;
}

impl<B, C> OrderSink for OrderUpdater<B, C>
where
    B: LoyaltyStore + 'static,
    C: AccrualClient + 'static,
{
    fn submit(&self, order: Order) -> Result<(), UpdaterError> {
        OrderUpdater::submit(self, order)
    }

    fn submit_many(&self, orders: Vec<Order>) -> Result<(), UpdaterError> {
        OrderUpdater::submit_many(self, orders)
    }
}

/// Maps the accrual service's lifecycle onto the local one. `None` marks a protocol error.
fn local_status(status: AccrualStatus) -> Option<OrderStatus> {
    match status {
        // REGISTERED means the service has the order but no verdict yet; locally that is simply "in processing".
        AccrualStatus::Registered | AccrualStatus::Processing => Some(OrderStatus::Processing),
        AccrualStatus::Invalid => Some(OrderStatus::Invalid),
        AccrualStatus::Processed => Some(OrderStatus::Processed),
        AccrualStatus::Unknown => None,
    }
}

async fn run_poller<C: AccrualClient>(
    client: Arc<C>,
    pending: PendingOrders,
    transition_tx: mpsc::Sender<StatusTransition>,
    err_tx: mpsc::UnboundedSender<UpdaterError>,
    cancel: CancellationToken,
    poll_period: Duration,
) {
    let mut timer = tokio::time::interval(poll_period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("🔄 Poller started");
    'poll: loop {
        tokio::select! {
            _ = cancel.cancelled() => break 'poll,
            _ = timer.tick() => {},
        }
        let snapshot = pending.snapshot();
        if !snapshot.is_empty() {
            trace!("🔄 Polling the accrual service for {} orders", snapshot.len());
        }
        for entry in snapshot {
            if cancel.is_cancelled() {
                break 'poll;
            }
            match client.get_accrual(&entry.number).await {
                AccrualOutcome::Known { status, accrual } => {
                    let Some(new_status) = local_status(status) else {
                        error!("🔄 Undocumented accrual status {status:?} for order [{}]; leaving it untouched", entry.number);
                        let _ = err_tx.send(UpdaterError::ProtocolError(entry.number.clone()));
                        continue;
                    };
                    if new_status == entry.status {
                        continue;
                    }
                    debug!("🔄 Order [{}] moved {} → {new_status}", entry.number, entry.status);
                    let number = entry.number.clone();
                    let transition = StatusTransition { order: entry, new_status, accrual };
                    // The entry may only leave the pending set once the writer holds the transition, otherwise a
                    // crash between the two would lose it.
                    if transition_tx.send(transition).await.is_err() {
                        warn!("🔄 Transition queue closed; poller exiting");
                        break 'poll;
                    }
                    if new_status.is_terminal() {
                        pending.remove(&number);
                    } else {
                        pending.set_state(&number, new_status, accrual);
                    }
                },
                AccrualOutcome::NoContent => {
                    // The service has not heard of the order yet. Keep watching it.
                    trace!("🔄 Accrual service does not know order [{}] yet", entry.number);
                },
                AccrualOutcome::RateLimited { retry_after } => {
                    info!("🔄 Accrual service rate limit hit; pausing the poller for {retry_after:?}");
                    tokio::select! {
                        _ = cancel.cancelled() => break 'poll,
                        _ = tokio::time::sleep(retry_after) => {},
                    }
                },
                AccrualOutcome::RemoteError => {
                    let _ = err_tx.send(UpdaterError::AccrualRemoteError(entry.number.clone()));
                },
                AccrualOutcome::TransportError => {
                    let _ = err_tx.send(UpdaterError::AccrualUnreachable(entry.number.clone()));
                },
            }
        }
    }
    debug!("🔄 Poller stopped");
}

/// Shutdown is driven through the queue, not the cancellation token: when the poller observes the cancel it drops
/// its sender, `recv` returns `None` only after every queued transition has been handed over, and so nothing the
/// poller has already untracked can be lost.
async fn run_writer<B: LoyaltyStore>(
    store: B,
    pending: PendingOrders,
    mut transition_rx: mpsc::Receiver<StatusTransition>,
    err_tx: mpsc::UnboundedSender<UpdaterError>,
    flush_period: Duration,
    batch_size: usize,
) {
    let mut buffer: Vec<StatusTransition> = Vec::with_capacity(batch_size);
    let mut timer = tokio::time::interval(flush_period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("🔄 Batch writer started");
    loop {
        tokio::select! {
            _ = timer.tick() => {
                if !buffer.is_empty() {
                    debug!("🔄 Flushing {} transitions (timer)", buffer.len());
                    flush(&store, &pending, &mut buffer, &err_tx).await;
                }
            },
            received = transition_rx.recv() => match received {
                Some(transition) => {
                    buffer.push(transition);
                    if buffer.len() >= batch_size {
                        debug!("🔄 Flushing {} transitions (batch full)", buffer.len());
                        flush(&store, &pending, &mut buffer, &err_tx).await;
                    }
                },
                // The poller is gone and the queue is drained.
                None => break,
            },
        }
    }
    // Whatever is buffered gets one last chance; a failure is reported like any other.
    flush(&store, &pending, &mut buffer, &err_tx).await;
    debug!("🔄 Batch writer stopped");
}

async fn flush<B: LoyaltyStore>(
    store: &B,
    pending: &PendingOrders,
    buffer: &mut Vec<StatusTransition>,
    err_tx: &mpsc::UnboundedSender<UpdaterError>,
) {
    if buffer.is_empty() {
        return;
    }
    let batch = buffer.iter().map(StatusTransition::updated_order).collect::<Vec<Order>>();
    match store.update_orders(&batch).await {
        Ok(()) => trace!("🔄 Persisted {} order transitions", batch.len()),
        Err(e) => {
            error!("🔄 Could not persist a batch of {} transitions; re-queueing their orders. {e}", batch.len());
            // Rewind each affected order to its earliest pre-transition snapshot so the poller re-observes the
            // whole change on the next tick.
            let mut rewound = HashSet::new();
            for transition in buffer.iter() {
                if rewound.insert(transition.order.number.clone()) {
                    pending.reinstate(transition.order.clone());
                }
            }
            let _ = err_tx.send(UpdaterError::StorageError(e));
        },
    }
    buffer.clear();
}
