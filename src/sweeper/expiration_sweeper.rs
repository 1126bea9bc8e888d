use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::booking::Booking;
use crate::error::AppError;
use crate::inventory::InventoryEngine;
use crate::persistence::unit_of_work::UnitOfWork;
use crate::ports::repositories::BookingRepository;
use crate::retry::backoff_with_jitter;

const RELEASE_OCC_ATTEMPTS: u32 = 5;

/// Runs on a cooperative cadence, each tick reclaiming stale Held bookings
/// (spec.md §4.4). One failing booking never aborts the sweep of the rest —
/// that partial-failure tolerance is the component's defining property.
pub struct ExpirationSweeper {
    booking_repo: Arc<dyn BookingRepository>,
    inventory: Arc<InventoryEngine>,
    uow: UnitOfWork,
    interval: Duration,
    page_size: i64,
}

impl ExpirationSweeper {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        inventory: Arc<InventoryEngine>,
        uow: UnitOfWork,
        interval: Duration,
        page_size: i64,
    ) -> Self {
        ExpirationSweeper {
            booking_repo,
            inventory,
            uow,
            interval,
            page_size,
        }
    }

    /// Spawns the cooperative polling task. The returned handle is not
    /// awaited by callers; the composition root keeps it alive for the
    /// process lifetime and aborts it on shutdown.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One sweep tick (spec.md §4.4): query expired Held bookings, reclaim
    /// each in isolation, log and continue past any single failure.
    pub async fn run_once(&self) {
        let now = Utc::now();
        let expired = match self.booking_repo.find_expired(now, self.page_size).await {
            Ok(bookings) => bookings,
            Err(e) => {
                error!(error = %e, "expiration sweeper failed to query expired bookings");
                return;
            }
        };

        if expired.is_empty() {
            return;
        }
        info!(count = expired.len(), "sweeping expired bookings");

        for booking in expired {
            if let Err(e) = self.reclaim(booking).await {
                error!(error = %e, "expiration sweeper failed to reclaim a booking, continuing");
            }
        }
    }

    async fn reclaim(&self, mut booking: Booking) -> Result<(), AppError> {
        for segment in &booking.segments {
            self.release_segment(segment.flight_id, segment.cabin).await;
        }

        booking.expire(Utc::now())?;
        self.uow
            .run(|tx| self.booking_repo.save(tx, &mut booking))
            .await?;
        Ok(())
    }

    async fn release_segment(&self, flight_id: crate::domain::flight_inventory::FlightId, cabin: crate::domain::flight_inventory::CabinClass) {
        for attempt in 1..=RELEASE_OCC_ATTEMPTS {
            match self.inventory.release_seats(flight_id, cabin, 1).await {
                Ok(_) => return,
                Err(e) if e.is_retryable() && attempt < RELEASE_OCC_ATTEMPTS => {
                    tokio::time::sleep(backoff_with_jitter(
                        attempt,
                        Duration::from_millis(50),
                        Duration::from_secs(2),
                    ))
                    .await;
                }
                Err(e) => {
                    warn!(error = %e, flight_id = %flight_id.0, "sweeper seat release failed, booking will still be marked Expired");
                    return;
                }
            }
        }
    }
}
