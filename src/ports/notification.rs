use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ticket::Ticket;
use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TicketSent {
    pub message_id: String,
}

/// Port: Notification Gateway (§6). Failures here at confirm-time are logged,
/// not fatal — the outbox-driven TicketIssued publish (C7) is the authoritative
/// at-least-once delivery mechanism (§7 propagation policy).
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_ticket(&self, ticket: &Ticket, recipient: Recipient) -> AppResult<TicketSent>;
}

/// In-process stand-in; records sends in memory for assertions in tests.
#[derive(Default)]
pub struct MockNotificationGateway {
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl NotificationGateway for MockNotificationGateway {
    async fn send_ticket(&self, ticket: &Ticket, recipient: Recipient) -> AppResult<TicketSent> {
        let message_id = format!("msg-{}", ticket.ticket_number);
        self.sent
            .lock()
            .unwrap()
            .push((ticket.ticket_number.clone(), recipient.email));
        Ok(TicketSent { message_id })
    }
}

impl MockNotificationGateway {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub api_key: String,
    pub sender: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl std::fmt::Display for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NotificationConfig {{ sender: {}, api_key: [redacted] }}",
            self.sender
        )
    }
}
