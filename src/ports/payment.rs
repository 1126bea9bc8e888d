use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::money::Money;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct CheckoutCustomer {
    pub email: String,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutRequest {
    pub amount: Money,
    pub customer: CheckoutCustomer,
    pub booking_reference: String,
    pub booking_id: uuid::Uuid,
    pub success_url: String,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub checkout_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub checkout_id: String,
    pub transaction_id: String,
    pub paid_at: DateTime<Utc>,
    pub amount: Money,
}

#[derive(Debug, Clone)]
pub enum CheckoutStatus {
    Pending,
    Completed(PaymentConfirmation),
    Expired,
    Failed { reason: String },
    Declined,
}

/// Port: Payment Gateway (§6). Implementations must be idempotent keyed by
/// `booking_reference` (the PNR) so saga retries never double-charge.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: CreateCheckoutRequest) -> AppResult<CheckoutSession>;

    async fn get_checkout_status(&self, checkout_id: &str) -> AppResult<CheckoutStatus>;
}

/// In-process stand-in used by the composition root until a real provider SDK
/// is wired in (§1 Non-goals: payment provider SDK is an external collaborator).
/// Deterministic: any booking reference containing "DECLINE" is declined, one
/// containing "FAIL" errors as unavailable, everything else completes
/// immediately so integration tests and local runs don't block on a poll loop.
pub struct MockPaymentGateway {
    sessions: Mutex<HashMap<String, (CreateCheckoutRequest, DateTime<Utc>)>>,
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        MockPaymentGateway {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout(&self, request: CreateCheckoutRequest) -> AppResult<CheckoutSession> {
        let id = format!("checkout-{}", request.booking_reference);
        let expires_at = Utc::now() + chrono::Duration::minutes(30);
        self.sessions
            .lock()
            .unwrap()
            .insert(id.clone(), (request, expires_at));
        Ok(CheckoutSession {
            id: id.clone(),
            checkout_url: format!("https://pay.example.test/checkout/{id}"),
            expires_at,
        })
    }

    async fn get_checkout_status(&self, checkout_id: &str) -> AppResult<CheckoutStatus> {
        let sessions = self.sessions.lock().unwrap();
        let (request, _) = sessions
            .get(checkout_id)
            .ok_or(AppError::CheckoutNotFound)?;

        if request.booking_reference.contains("DECLINE") {
            return Ok(CheckoutStatus::Declined);
        }
        if request.booking_reference.contains("FAIL") {
            return Err(AppError::PaymentUnavailable);
        }
        Ok(CheckoutStatus::Completed(PaymentConfirmation {
            checkout_id: checkout_id.to_string(),
            transaction_id: format!("txn-{checkout_id}"),
            paid_at: Utc::now(),
            amount: request.amount,
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub api_key: String,
    pub product_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl std::fmt::Display for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PaymentConfig {{ base_url: {}, product_id: {}, api_key: [redacted] }}",
            self.base_url, self.product_id
        )
    }
}
