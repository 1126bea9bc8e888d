use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::booking::{Booking, BookingId, BookingSegment, BookingStatus, Passenger};
use crate::domain::flight_inventory::{CabinClass, FlightId};
use crate::domain::pnr::PnrCode;
use crate::domain::ticket::Ticket;
use crate::error::{AppError, AppResult};
use crate::inventory::InventoryEngine;
use crate::persistence::unit_of_work::UnitOfWork;
use crate::ports::notification::{NotificationGateway, Recipient};
use crate::ports::payment::{
    CheckoutCustomer, CheckoutStatus, CreateCheckoutRequest, PaymentGateway,
};
use crate::ports::repositories::{BookingRepository, TicketRepository};
use crate::retry::backoff_with_jitter;

/// Caller input for `bookFlight` (spec.md §4.3). Card/token capture happens at
/// the hosted checkout page the payment gateway returns, so no card token
/// travels through this command — matching the `createCheckout` port contract
/// in spec.md §6, which never takes one either.
#[derive(Debug, Clone)]
pub struct BookFlightCommand {
    pub flight_id: FlightId,
    pub cabin: CabinClass,
    pub passengers: Vec<Passenger>,
    pub seat_number: Option<String>,
    pub customer_email: String,
    pub customer_external_id: Option<String>,
    pub success_url: String,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookFlightOutcome {
    pub booking: Booking,
    pub checkout_url: Option<String>,
}

/// Retry/timeout knobs drawn from the config surface (spec.md §6 "saga retry
/// policy"). Defaults match the numbers spec.md states explicitly.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    pub pnr_max_attempts: u32,
    pub payment_poll_interval: Duration,
    pub payment_max_poll_duration: Duration,
    pub payment_retry_attempts: u32,
    pub payment_attempt_timeout: Duration,
    pub confirm_occ_retries: u32,
}

impl Default for SagaConfig {
    fn default() -> Self {
        SagaConfig {
            pnr_max_attempts: 100,
            payment_poll_interval: Duration::from_secs(2),
            payment_max_poll_duration: Duration::from_secs(30 * 60),
            payment_retry_attempts: 3,
            payment_attempt_timeout: Duration::from_secs(30),
            confirm_occ_retries: 3,
        }
    }
}

pub struct BookingSaga {
    inventory: Arc<InventoryEngine>,
    booking_repo: Arc<dyn BookingRepository>,
    ticket_repo: Arc<dyn TicketRepository>,
    payment: Arc<dyn PaymentGateway>,
    notification: Arc<dyn NotificationGateway>,
    uow: UnitOfWork,
    config: SagaConfig,
}

impl BookingSaga {
    pub fn new(
        inventory: Arc<InventoryEngine>,
        booking_repo: Arc<dyn BookingRepository>,
        ticket_repo: Arc<dyn TicketRepository>,
        payment: Arc<dyn PaymentGateway>,
        notification: Arc<dyn NotificationGateway>,
        uow: UnitOfWork,
        config: SagaConfig,
    ) -> Self {
        BookingSaga {
            inventory,
            booking_repo,
            ticket_repo,
            payment,
            notification,
            uow,
            config,
        }
    }

    /// Steps 1-8 of spec.md §4.3.
    pub async fn book_flight(&self, command: BookFlightCommand) -> AppResult<BookFlightOutcome> {
        let hold = self
            .inventory
            .hold_seats(command.flight_id, command.cabin, 1)
            .await?;

        self.book_flight_after_hold(&command, &hold).await
    }

    async fn book_flight_after_hold(
        &self,
        command: &BookFlightCommand,
        hold: &crate::inventory::HoldResult,
    ) -> AppResult<BookFlightOutcome> {
        let segment = BookingSegment {
            id: uuid::Uuid::new_v4(),
            flight_id: command.flight_id,
            cabin: command.cabin,
            price: hold.unit_price,
            seat_number: command.seat_number.clone(),
        };

        // No booking row exists yet, so a failure here must release the hold
        // itself; every failure branch past this point persists a Held
        // booking first and compensates through `compensate_held_booking`,
        // which owns the release for that booking from here on.
        let pnr = match self.generate_unique_pnr().await {
            Ok(pnr) => pnr,
            Err(failure) => {
                self.compensate_failed_hold(command.flight_id, command.cabin)
                    .await;
                return Err(failure);
            }
        };
        let mut booking = Booking::new_held(
            pnr.clone(),
            command.passengers.clone(),
            vec![segment],
            Utc::now(),
        );

        self.uow
            .run(|tx| self.booking_repo.save(tx, &mut booking))
            .await?;

        let checkout = match self.create_checkout(command, &booking).await {
            Ok(session) => session,
            Err(failure) => {
                self.compensate_held_booking(&mut booking, failure.to_string())
                    .await;
                return Err(failure);
            }
        };

        match self.poll_until_terminal(&checkout.id).await {
            Ok(confirmation) => {
                let transitioned = self
                    .confirm_with_retry(booking.id, confirmation.transaction_id)
                    .await?;
                booking = self
                    .booking_repo
                    .find_by_id(booking.id)
                    .await?
                    .ok_or(AppError::BookingNotFound)?;

                if transitioned {
                    self.issue_and_notify(&booking).await;
                }

                Ok(BookFlightOutcome {
                    booking,
                    checkout_url: Some(checkout.checkout_url),
                })
            }
            Err(failure) => {
                self.compensate_held_booking(&mut booking, failure.to_string())
                    .await;
                Err(failure)
            }
        }
    }

    /// Idempotent re-entry point for asynchronous payment completion
    /// (webhook), spec.md §4.3 "Operation: confirmBooking".
    pub async fn confirm_booking(&self, booking_id: BookingId, transaction_id: String) -> AppResult<Booking> {
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or(AppError::BookingNotFound)?;

        match booking.status {
            BookingStatus::Confirmed => Ok(booking),
            BookingStatus::Held => {
                let transitioned = self.confirm_with_retry(booking_id, transaction_id).await?;
                let confirmed = self
                    .booking_repo
                    .find_by_id(booking_id)
                    .await?
                    .ok_or(AppError::BookingNotFound)?;
                if transitioned {
                    self.issue_and_notify(&confirmed).await;
                }
                Ok(confirmed)
            }
            other => Err(AppError::InvalidBookingState {
                from: other,
                attempted: "confirmBooking",
            }),
        }
    }

    /// Draws random PNRs until one has no existing booking, bounded by
    /// `pnr_max_attempts` (spec.md §4.3 step 2).
    async fn generate_unique_pnr(&self) -> AppResult<PnrCode> {
        for _ in 0..self.config.pnr_max_attempts {
            let candidate = PnrCode::generate();
            if self.booking_repo.find_by_pnr(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AppError::PnrExhausted)
    }

    async fn create_checkout(
        &self,
        command: &BookFlightCommand,
        booking: &Booking,
    ) -> AppResult<crate::ports::payment::CheckoutSession> {
        let amount = booking
            .total_price()
            .ok_or_else(|| AppError::DataIntegrity("booking has no priced segments".to_string()))?;
        let request = CreateCheckoutRequest {
            amount,
            customer: CheckoutCustomer {
                email: command.customer_email.clone(),
                external_id: command.customer_external_id.clone(),
            },
            booking_reference: booking.pnr.as_str().to_string(),
            booking_id: booking.id.0,
            success_url: command.success_url.clone(),
            cancel_url: command.cancel_url.clone(),
        };

        self.with_payment_retry(|| {
            let request = request.clone();
            async move { self.payment.create_checkout(request).await }
        })
        .await
    }

    /// Bounded polling loop for an async checkout completion (spec.md §4.3
    /// step 4): polls at `payment_poll_interval` up to `payment_max_poll_duration`.
    async fn poll_until_terminal(
        &self,
        checkout_id: &str,
    ) -> AppResult<crate::ports::payment::PaymentConfirmation> {
        let deadline = tokio::time::Instant::now() + self.config.payment_max_poll_duration;

        loop {
            let status = self
                .with_payment_retry(|| async move { self.payment.get_checkout_status(checkout_id).await })
                .await?;

            match status {
                CheckoutStatus::Completed(confirmation) => return Ok(confirmation),
                CheckoutStatus::Declined => return Err(AppError::PaymentDeclined),
                CheckoutStatus::Expired => return Err(AppError::PaymentUnavailable),
                CheckoutStatus::Failed { reason } => {
                    warn!(checkout_id, reason, "payment checkout failed");
                    return Err(AppError::PaymentUnavailable);
                }
                CheckoutStatus::Pending => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(AppError::PaymentUnavailable);
                    }
                    tokio::time::sleep(self.config.payment_poll_interval).await;
                }
            }
        }
    }

    /// Wraps a single payment call with a per-attempt timeout and bounded
    /// retry on retryable errors (spec.md §4.3 step 4, §5 timeouts).
    async fn with_payment_retry<F, Fut, T>(&self, op: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(self.config.payment_attempt_timeout, op()).await;
            match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if e.is_retryable() && attempt < self.config.payment_retry_attempts => {
                    tokio::time::sleep(backoff_with_jitter(
                        attempt,
                        Duration::from_millis(200),
                        Duration::from_secs(5),
                    ))
                    .await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) if attempt < self.config.payment_retry_attempts => {
                    tokio::time::sleep(backoff_with_jitter(
                        attempt,
                        Duration::from_millis(200),
                        Duration::from_secs(5),
                    ))
                    .await;
                }
                Err(_) => return Err(AppError::ExternalServiceTimeout),
            }
        }
    }

    /// Transitions a loaded booking to Confirmed, retrying on OCC conflict by
    /// re-reading between attempts (spec.md §4.3 step 6, confirmBooking).
    /// Returns `true` only when *this* call performed the Held->Confirmed
    /// transition, `false` when it found the booking already Confirmed (a
    /// racing caller won) — callers must issue tickets only on `true`, or a
    /// concurrent webhook/in-saga confirm race issues a ticket twice.
    async fn confirm_with_retry(&self, booking_id: BookingId, transaction_id: String) -> AppResult<bool> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut booking = self
                .booking_repo
                .find_by_id(booking_id)
                .await?
                .ok_or(AppError::BookingNotFound)?;

            if booking.status == BookingStatus::Confirmed {
                return Ok(false);
            }

            booking.confirm(transaction_id.clone(), Utc::now())?;

            match self.uow.run(|tx| self.booking_repo.save(tx, &mut booking)).await {
                Ok(()) => return Ok(true),
                Err(AppError::OptimisticLockConflict { .. }) if attempt < self.config.confirm_occ_retries => {
                    tokio::time::sleep(backoff_with_jitter(
                        attempt,
                        Duration::from_millis(50),
                        Duration::from_millis(500),
                    ))
                    .await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issues tickets for a Confirmed booking and attempts a best-effort
    /// notification send. Failures here are logged, never surfaced — the
    /// outbox-driven `TicketIssued` publish is the durable delivery path
    /// (spec.md §4.3 step 7, §7 propagation policy).
    async fn issue_and_notify(&self, booking: &Booking) {
        let tickets = match Ticket::issue_for_booking(booking, Utc::now()) {
            Ok(tickets) => tickets,
            Err(e) => {
                error!(error = %e, pnr = %booking.pnr, "failed to build tickets for confirmed booking");
                return;
            }
        };

        for ticket in &tickets {
            if let Err(e) = self.uow.run(|tx| self.ticket_repo.save(tx, ticket)).await {
                error!(error = %e, ticket_number = %ticket.ticket_number, "failed to persist issued ticket");
                continue;
            }

            let recipient_name = booking
                .passengers
                .iter()
                .find(|p| p.id == ticket.passenger_id)
                .map(|p| p.name.clone());

            let recipient = Recipient {
                email: format!("{}@example.test", ticket.pnr.as_str().to_lowercase()),
                name: recipient_name,
            };

            if let Err(e) = self.notification.send_ticket(ticket, recipient).await {
                warn!(error = %e, ticket_number = %ticket.ticket_number, "ticket notification send failed");
            }
        }
    }

    /// Step 5 compensation: release the held seat and cancel the Held
    /// booking. Release is best-effort — its own OCC retries are bounded and
    /// a final failure is logged, not propagated; the sweeper reclaims stuck
    /// holds regardless (spec.md §4.3 step 5a).
    async fn compensate_held_booking(&self, booking: &mut Booking, reason: String) {
        self.release_with_retry(booking.segments[0].flight_id, booking.segments[0].cabin)
            .await;

        if let Err(e) = booking.cancel(reason, Utc::now()) {
            error!(error = %e, pnr = %booking.pnr, "failed to transition booking to Cancelled during compensation");
            return;
        }
        if let Err(e) = self.uow.run(|tx| self.booking_repo.save(tx, booking)).await {
            error!(error = %e, pnr = %booking.pnr, "failed to persist Cancelled booking during compensation");
        }
    }

    /// Compensation for a failure that occurs after a seat hold but before
    /// any booking row is persisted (e.g. PNR generation exhausted).
    async fn compensate_failed_hold(&self, flight_id: FlightId, cabin: CabinClass) {
        self.release_with_retry(flight_id, cabin).await;
    }

    async fn release_with_retry(&self, flight_id: FlightId, cabin: CabinClass) {
        const RELEASE_ATTEMPTS: u32 = 5;
        for attempt in 1..=RELEASE_ATTEMPTS {
            match self.inventory.release_seats(flight_id, cabin, 1).await {
                Ok(_) => return,
                Err(e) if e.is_retryable() && attempt < RELEASE_ATTEMPTS => {
                    tokio::time::sleep(backoff_with_jitter(
                        attempt,
                        Duration::from_millis(50),
                        Duration::from_secs(2),
                    ))
                    .await;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        flight_id = %flight_id.0,
                        "seat release compensation failed, leaving hold for the sweeper"
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // Exercised end-to-end against a live Postgres instance plus the mock
    // payment/notification gateways in tests/booking_saga_test.rs — the saga
    // has no meaningful behavior to unit-test in isolation from persistence.
}
