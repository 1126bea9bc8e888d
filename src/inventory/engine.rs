use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::domain::flight_inventory::{CabinClass, FlightId, FlightInventory};
use crate::domain::money::Money;
use crate::error::{AppError, AppResult};
use crate::persistence::unit_of_work::UnitOfWork;
use crate::ports::repositories::FlightInventoryRepository;
use crate::retry::backoff_with_jitter;

const MAX_BATCH_SIZE: usize = 50;
const MAX_OCC_RETRIES: u32 = 10;
const BACKOFF_BASE: Duration = Duration::from_millis(20);
const BACKOFF_CAP: Duration = Duration::from_millis(2_000);

/// Outcome of a successful `HoldSeats` call (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct HoldResult {
    pub inventory_snapshot: FlightInventory,
    pub unit_price: Money,
    pub total_price: Money,
    pub seats_held: u32,
    pub hold_expires_at: DateTime<Utc>,
}

/// Outcome of a successful `ReleaseSeats` call.
#[derive(Debug, Clone)]
pub struct ReleaseResult {
    pub inventory_snapshot: FlightInventory,
}

enum QueueItem {
    Hold {
        flight_id: FlightId,
        cabin: CabinClass,
        n: u32,
        respond: oneshot::Sender<AppResult<HoldResult>>,
    },
    Release {
        flight_id: FlightId,
        cabin: CabinClass,
        n: u32,
        respond: oneshot::Sender<AppResult<ReleaseResult>>,
    },
}

impl QueueItem {
    fn flight_id(&self) -> FlightId {
        match self {
            QueueItem::Hold { flight_id, .. } | QueueItem::Release { flight_id, .. } => *flight_id,
        }
    }
}

/// Per-item fold result, kept separate from `QueueItem` so a batch can be
/// refolded from scratch on OCC retry without having consumed any response
/// channel yet.
enum ItemOutcome {
    Hold(AppResult<(Money, Money, u32)>),
    Release(AppResult<()>),
}

/// Front door to the per-flight coalescing queue plus its OCC-guarded
/// direct-path fallback. One instance is shared (behind `Arc`) by every
/// caller in the process; `new` starts the single background consumer task
/// described in spec.md §5 ("singleton long-lived worker task per process
/// plus the direct-path that runs on the caller's task").
pub struct InventoryEngine {
    repo: Arc<dyn FlightInventoryRepository>,
    uow: UnitOfWork,
    sender: mpsc::Sender<QueueItem>,
    depth: Arc<AtomicUsize>,
    hold_duration: Duration,
}

impl InventoryEngine {
    /// `queue_capacity` and `hold_duration` come from the config surface
    /// (defaults 500 and 30 minutes respectively, spec.md §6).
    pub fn new(
        repo: Arc<dyn FlightInventoryRepository>,
        uow: UnitOfWork,
        queue_capacity: usize,
        hold_duration: Duration,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let depth = Arc::new(AtomicUsize::new(0));

        let engine = Arc::new(InventoryEngine {
            repo: repo.clone(),
            uow: uow.clone(),
            sender,
            depth: depth.clone(),
            hold_duration,
        });

        tokio::spawn(run_worker(repo, uow, receiver, depth, hold_duration));
        engine
    }

    pub async fn hold_seats(
        &self,
        flight_id: FlightId,
        cabin: CabinClass,
        n: u32,
    ) -> AppResult<HoldResult> {
        if n == 0 {
            return Err(AppError::InvalidAmount(n));
        }
        let start = Instant::now();
        let (respond, rx) = oneshot::channel();
        let item = QueueItem::Hold {
            flight_id,
            cabin,
            n,
            respond,
        };

        let result = self.submit(item, rx).await;
        crate::metrics::record_hold_latency(start.elapsed().as_secs_f64());
        crate::metrics::record_hold_attempt(result.is_ok());
        result
    }

    pub async fn release_seats(
        &self,
        flight_id: FlightId,
        cabin: CabinClass,
        n: u32,
    ) -> AppResult<ReleaseResult> {
        if n == 0 {
            return Err(AppError::InvalidAmount(n));
        }
        let (respond, rx) = oneshot::channel();
        let item = QueueItem::Release {
            flight_id,
            cabin,
            n,
            respond,
        };

        let result = self.submit(item, rx).await;
        crate::metrics::record_release_attempt();
        result
    }

    pub async fn get_availability(&self, flight_id: FlightId) -> AppResult<FlightInventory> {
        self.repo
            .get_by_flight_id(flight_id)
            .await?
            .ok_or(AppError::FlightNotFound)
    }

    /// Enqueues `item`, falling through to the direct path when the bounded
    /// queue is full (spec.md §4.1, point 1).
    async fn submit<T>(&self, item: QueueItem, rx: oneshot::Receiver<AppResult<T>>) -> AppResult<T> {
        match self.sender.try_send(item) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::Relaxed);
                crate::metrics::set_queue_depth(self.depth.load(Ordering::Relaxed));
            }
            Err(mpsc::error::TrySendError::Full(item)) => {
                debug!("inventory queue full, falling back to direct path");
                process_flight_batch(
                    &self.repo,
                    &self.uow,
                    item.flight_id(),
                    vec![item],
                    self.hold_duration,
                )
                .await;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                return Err(AppError::PersistenceFailure(
                    "inventory worker channel closed".to_string(),
                ));
            }
        }

        rx.await.map_err(|_| {
            AppError::PersistenceFailure("inventory response channel dropped".to_string())
        })?
    }
}

async fn run_worker(
    repo: Arc<dyn FlightInventoryRepository>,
    uow: UnitOfWork,
    mut receiver: mpsc::Receiver<QueueItem>,
    depth: Arc<AtomicUsize>,
    hold_duration: Duration,
) {
    while let Some(first) = receiver.recv().await {
        let mut batch = vec![first];
        while batch.len() < MAX_BATCH_SIZE {
            match receiver.try_recv() {
                Ok(item) => batch.push(item),
                Err(_) => break,
            }
        }
        depth.fetch_sub(batch.len(), Ordering::Relaxed);
        crate::metrics::set_queue_depth(depth.load(Ordering::Relaxed));
        crate::metrics::record_batch_size(batch.len());

        let mut groups: IndexMap<FlightId, Vec<QueueItem>> = IndexMap::new();
        for item in batch {
            groups.entry(item.flight_id()).or_default().push(item);
        }

        for (flight_id, items) in groups {
            process_flight_batch(&repo, &uow, flight_id, items, hold_duration).await;
        }
    }
}

/// Folds `items` over one loaded snapshot, persists once, and retries the
/// whole batch on OCC conflict (spec.md §4.1 "Algorithm detail"). Delivers
/// every request's completion via its oneshot channel before returning.
async fn process_flight_batch(
    repo: &Arc<dyn FlightInventoryRepository>,
    uow: &UnitOfWork,
    flight_id: FlightId,
    items: Vec<QueueItem>,
    hold_duration: Duration,
) {
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let mut inventory = match repo.get_by_flight_id(flight_id).await {
            Ok(Some(inv)) => inv,
            Ok(None) => return deliver_errors(items, AppError::FlightNotFound),
            Err(e) => return deliver_errors(items, e),
        };

        let mut outcomes = Vec::with_capacity(items.len());
        let mut mutated = false;
        for item in &items {
            match item {
                QueueItem::Hold { cabin, n, .. } => match inventory.hold_seats(*cabin, *n) {
                    Ok(unit_price) => {
                        mutated = true;
                        let total_price = unit_price.multiply_by(*n);
                        outcomes.push(ItemOutcome::Hold(Ok((unit_price, total_price, *n))));
                    }
                    Err(e) => outcomes.push(ItemOutcome::Hold(Err(e))),
                },
                QueueItem::Release { cabin, n, .. } => match inventory.release_seats(*cabin, *n) {
                    Ok(()) => {
                        mutated = true;
                        outcomes.push(ItemOutcome::Release(Ok(())));
                    }
                    Err(e) => outcomes.push(ItemOutcome::Release(Err(e))),
                },
            }
        }

        if !mutated {
            // Every fold attempt failed: nothing to persist, and `outcomes`
            // already carries each request's specific error.
            return deliver_outcomes(items, outcomes, None, hold_duration);
        }

        let repo_for_save = repo.clone();
        let save_result = uow
            .run(move |tx| {
                let mut inventory = inventory;
                async move {
                    repo_for_save.save(tx, &mut inventory).await?;
                    Ok(inventory)
                }
            })
            .await;

        match save_result {
            Ok(final_inventory) => {
                return deliver_outcomes(items, outcomes, Some(final_inventory), hold_duration);
            }
            Err(AppError::OptimisticLockConflict { expected, actual })
                if attempt < MAX_OCC_RETRIES =>
            {
                warn!(
                    flight_id = %flight_id.0,
                    expected,
                    actual,
                    attempt,
                    "inventory batch OCC conflict, retrying"
                );
                tokio::time::sleep(backoff_with_jitter(attempt, BACKOFF_BASE, BACKOFF_CAP)).await;
            }
            Err(e) => return deliver_errors(items, e),
        }
    }
}

fn deliver_errors(items: Vec<QueueItem>, err: AppError) {
    for item in items {
        match item {
            QueueItem::Hold { respond, .. } => {
                let _ = respond.send(Err(err.clone()));
            }
            QueueItem::Release { respond, .. } => {
                let _ = respond.send(Err(err.clone()));
            }
        }
    }
}

fn deliver_outcomes(
    items: Vec<QueueItem>,
    outcomes: Vec<ItemOutcome>,
    snapshot: Option<FlightInventory>,
    hold_duration: Duration,
) {
    for (item, outcome) in items.into_iter().zip(outcomes.into_iter()) {
        match (item, outcome) {
            (QueueItem::Hold { respond, .. }, ItemOutcome::Hold(Ok((unit_price, total_price, seats_held)))) => {
                let snapshot = snapshot
                    .clone()
                    .expect("a successful hold fold always produces a persisted snapshot");
                let _ = respond.send(Ok(HoldResult {
                    inventory_snapshot: snapshot,
                    unit_price,
                    total_price,
                    seats_held,
                    hold_expires_at: Utc::now()
                        + chrono::Duration::from_std(hold_duration).unwrap_or_default(),
                }));
            }
            (QueueItem::Hold { respond, .. }, ItemOutcome::Hold(Err(e))) => {
                let _ = respond.send(Err(e));
            }
            (QueueItem::Release { respond, .. }, ItemOutcome::Release(Ok(()))) => {
                let snapshot = snapshot
                    .clone()
                    .expect("a successful release fold always produces a persisted snapshot");
                let _ = respond.send(Ok(ReleaseResult {
                    inventory_snapshot: snapshot,
                }));
            }
            (QueueItem::Release { respond, .. }, ItemOutcome::Release(Err(e))) => {
                let _ = respond.send(Err(e));
            }
            _ => unreachable!("item/outcome kind mismatch"),
        }
    }
}
