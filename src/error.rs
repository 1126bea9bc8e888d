use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::Request;
use rocket::Response;
use serde::Serialize;
use serde_json::json;
use std::io::Cursor;
use thiserror::Error;

use crate::domain::booking::BookingStatus;

/// Full error taxonomy (spec.md §7): Domain / Concurrency / Persistence / External.
/// Kept as one flat enum, same shape as the teacher's `AppError`, so HTTP mapping
/// stays centralized at the Responder impl below while internal callers match on
/// specific variants.
#[derive(Error, Debug, Clone, Serialize)]
pub enum AppError {
    // -- Domain --
    #[error("Flight is fully booked")]
    FlightFull,
    #[error("Flight not found")]
    FlightNotFound,
    #[error("Invalid seat amount: {0}")]
    InvalidAmount(u32),
    #[error("Releasing {attempted} would exceed capacity {capacity}")]
    OverCapacity { capacity: u32, attempted: u32 },
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Booking in state {from:?} cannot {attempted}")]
    InvalidBookingState {
        from: BookingStatus,
        attempted: &'static str,
    },
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Exhausted PNR generation attempts")]
    PnrExhausted,

    // -- Concurrency --
    #[error("Optimistic lock conflict: expected version {expected}, actual {actual}")]
    OptimisticLockConflict { expected: i64, actual: i64 },

    // -- Persistence --
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("Persistence operation timed out")]
    PersistenceTimeout,
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("Referenced entity not found: {0}")]
    ReferenceNotFound(String),
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    // -- External: payment --
    #[error("Payment provider unavailable")]
    PaymentUnavailable,
    #[error("Payment declined")]
    PaymentDeclined,
    #[error("Checkout not found")]
    CheckoutNotFound,
    #[error("Unsupported currency")]
    UnsupportedCurrency,

    // -- External: notification --
    #[error("Notification provider unavailable")]
    NotificationUnavailable,
    #[error("Notification authentication failed")]
    NotificationAuth,
    #[error("Invalid notification recipient")]
    InvalidRecipient,
    #[error("Notification rate limited, retry after {retry_after_seconds}s")]
    NotificationRateLimit { retry_after_seconds: u64 },

    // -- External: generic adapter mapping (C8) --
    #[error("External service returned unexpected status: {0}")]
    ExternalServiceUnexpectedStatus(u16),
    #[error("External service call timed out")]
    ExternalServiceTimeout,
    #[error("External service client error: {0}")]
    ExternalServiceClient(String),
    #[error("External service server error: {0}")]
    ExternalServiceServer(String),

    // -- Ambient (auth / validation at the HTTP edge, kept from the teacher) --
    #[error("Authentication error: {0}")]
    AuthError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Whether an error kind is worth retrying with back-off (§7 propagation policy).
    /// OCC conflicts, transient external errors and timeouts are retryable; declined
    /// payments and invalid inputs are terminal and must never be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::OptimisticLockConflict { .. }
                | AppError::PersistenceTimeout
                | AppError::ExternalServiceTimeout
                | AppError::ExternalServiceServer(_)
                | AppError::PaymentUnavailable
                | AppError::NotificationUnavailable
                | AppError::NotificationRateLimit { .. }
        )
    }
}

/// Maps a raw sqlx error to the taxonomy, sanitising it so connection strings,
/// file paths and credentials embedded in driver error text never reach logs.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    AppError::DuplicateEntity(sanitize(&db_err.message()))
                } else if db_err.is_foreign_key_violation() {
                    AppError::ReferenceNotFound(sanitize(&db_err.message()))
                } else {
                    AppError::DataIntegrity(sanitize(&db_err.message()))
                }
            }
            sqlx::Error::PoolTimedOut => AppError::PersistenceTimeout,
            _ => AppError::PersistenceFailure(sanitize(&err.to_string())),
        }
    }
}

/// Strips anything that looks like a credential, connection string or file path
/// out of a driver error message before it is logged or surfaced (§7).
fn sanitize(message: &str) -> String {
    let mut sanitized = message.to_string();
    for marker in ["postgres://", "postgresql://", "password=", "Password=", "/root/", "/home/"] {
        if let Some(idx) = sanitized.find(marker) {
            sanitized.truncate(idx);
            sanitized.push_str("[redacted]");
        }
    }
    sanitized
}

pub type AppResult<T> = Result<T, AppError>;

#[rocket::async_trait]
impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let status = match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) | AppError::InvalidAmount(_) => {
                Status::BadRequest
            }
            AppError::FlightNotFound | AppError::BookingNotFound | AppError::CheckoutNotFound => {
                Status::NotFound
            }
            AppError::AuthError(_) | AppError::NotificationAuth => Status::Unauthorized,
            AppError::FlightFull
            | AppError::OverCapacity { .. }
            | AppError::DuplicateEntity(_)
            | AppError::OptimisticLockConflict { .. }
            | AppError::InvalidBookingState { .. } => Status::Conflict,
            AppError::CurrencyMismatch(_) | AppError::UnsupportedCurrency => {
                Status::UnprocessableEntity
            }
            AppError::PaymentDeclined => Status::PaymentRequired,
            AppError::NotificationRateLimit { .. } => Status::TooManyRequests,
            _ => Status::InternalServerError,
        };

        let json = json!({ "error": self.to_string() });

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(None, Cursor::new(json.to_string()))
            .ok()
    }
}

/// OpenAPI response documentation for `AppError`, grounded on the teacher's
/// `utils/swagger_doc.rs` — one illustrative example per status code the
/// Responder impl above can produce.
impl rocket_okapi::response::OpenApiResponderInner for AppError {
    fn responses(
        _gen: &mut rocket_okapi::gen::OpenApiGenerator,
    ) -> rocket_okapi::Result<rocket_okapi::okapi::openapi3::Responses> {
        use rocket_okapi::okapi::openapi3::{MediaType, RefOr, Response as OA, Responses};
        use schemars::schema::SchemaObject;

        let mut responses = Responses::default();
        let examples: [(Status, &str, AppError); 6] = [
            (Status::BadRequest, "Bad Request", AppError::BadRequest("bad request".into())),
            (Status::Unauthorized, "Unauthorized", AppError::AuthError("unauthorized".into())),
            (Status::NotFound, "Not Found", AppError::BookingNotFound),
            (Status::Conflict, "Conflict", AppError::FlightFull),
            (
                Status::UnprocessableEntity,
                "Unprocessable Entity",
                AppError::CurrencyMismatch("EUR vs USD".into()),
            ),
            (
                Status::InternalServerError,
                "Internal Server Error",
                AppError::PersistenceFailure("unavailable".into()),
            ),
        ];

        for (status, description, example) in examples {
            let mut content = indexmap::IndexMap::new();
            content.insert(
                "application/json".to_string(),
                MediaType {
                    schema: Some(SchemaObject::default()),
                    example: Some(json!({ "error": example.to_string() })),
                    ..Default::default()
                },
            );
            responses.responses.insert(
                status.code.to_string(),
                RefOr::Object(OA {
                    description: description.to_string(),
                    content,
                    ..Default::default()
                }),
            );
        }

        Ok(responses)
    }
}
