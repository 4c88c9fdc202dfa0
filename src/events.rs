use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::{FulfillmentStatus, OverrideKind, QuotationStatus};

/// Domain events emitted by the workflow services.
///
/// Delivery is fire-and-forget: a failed send is logged and never fails
/// the operation that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    QuotationDraftCreated {
        quotation_id: Uuid,
    },
    QuotationStatusChanged {
        quotation_id: Uuid,
        old_status: QuotationStatus,
        new_status: QuotationStatus,
    },
    QuotationApproved {
        quotation_id: Uuid,
        sale_order_id: Uuid,
        total_amount: Decimal,
    },
    OverrideGranted {
        sale_order_id: Uuid,
        kind: OverrideKind,
        expires_at: Option<DateTime<Utc>>,
    },
    RiderInterestRegistered {
        fulfillment_id: Uuid,
        rider_id: Uuid,
    },
    RiderInterestWithdrawn {
        fulfillment_id: Uuid,
        rider_id: Uuid,
    },
    RiderAssigned {
        fulfillment_id: Uuid,
        rider_id: Uuid,
        rejected_riders: Vec<Uuid>,
    },
    FulfillmentStatusChanged {
        fulfillment_id: Uuid,
        old_status: FulfillmentStatus,
        new_status: FulfillmentStatus,
    },
    /// Best-effort user-facing notification request for the dispatcher.
    NotificationRequested {
        user_id: Uuid,
        kind: String,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort send used on workflow side effects: logs on failure
    /// instead of propagating, so notification problems never abort a
    /// committed transaction.
    pub async fn send_best_effort(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropped workflow event");
        }
    }
}

/// Consumes the event stream and dispatches notifications.
///
/// The notification transport is an external collaborator; here events
/// are logged with enough structure for the dispatcher to pick up.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::QuotationApproved {
                quotation_id,
                sale_order_id,
                total_amount,
            } => {
                info!(
                    quotation_id = %quotation_id,
                    sale_order_id = %sale_order_id,
                    total_amount = %total_amount,
                    "Quotation approved; sale order created"
                );
            }
            Event::RiderAssigned {
                fulfillment_id,
                rider_id,
                rejected_riders,
            } => {
                info!(
                    fulfillment_id = %fulfillment_id,
                    rider_id = %rider_id,
                    rejected = rejected_riders.len(),
                    "Rider assigned to fulfillment"
                );
            }
            Event::OverrideGranted {
                sale_order_id,
                kind,
                expires_at,
            } => {
                info!(
                    sale_order_id = %sale_order_id,
                    kind = %kind,
                    expires_at = ?expires_at,
                    "Override granted"
                );
            }
            Event::NotificationRequested {
                user_id,
                kind,
                message,
            } => {
                info!(user_id = %user_id, kind = %kind, message = %message, "Notification requested");
            }
            other => {
                info!(event = ?other, "Workflow event");
            }
        }
    }

    info!("Event processing loop stopped");
}
