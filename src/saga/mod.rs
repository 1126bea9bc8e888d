//! Booking Saga (C3): the hold -> create -> checkout -> confirm/compensate
//! workflow. Grounded on the teacher's `TicketService::book_ticket` revert
//! loop (`services/ticket_service.rs`) for the "undo what already succeeded
//! on later failure" shape, generalized to the payment-checkout saga in
//! spec.md §4.3.

pub mod booking_saga;

pub use booking_saga::{BookFlightCommand, BookFlightOutcome, BookingSaga};
