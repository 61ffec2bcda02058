//! Notification sink seam
//!
//! Fire-and-forget: the core emits "tell user Y that order X changed to
//! status S" events with no delivery guarantee. Emission failures are
//! logged and swallowed — they never roll back or fail the primary state
//! mutation.

use async_trait::async_trait;
use shared::models::NotificationChannel;
use shared::models::OrderStatus;
use shared::types::{Timestamp, UserId};
use shared::{AppError, AppResult, ErrorCode};
use tokio::sync::broadcast;

/// Outbound notification event
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundNotification {
    /// Event unique ID (audit tracing across transport adapters)
    pub event_id: String,
    pub recipient: UserId,
    pub channel: NotificationChannel,
    pub message: String,
    pub timestamp: Timestamp,
}

impl OutboundNotification {
    pub fn new(
        recipient: UserId,
        channel: NotificationChannel,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            recipient,
            channel,
            message: message.into(),
            timestamp,
        }
    }
}

/// Fire-and-forget notification transport
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: OutboundNotification) -> AppResult<()>;
}

/// Broadcast channel capacity (bursts of status updates across many orders)
const NOTIFY_CHANNEL_CAPACITY: usize = 4096;

/// Broadcast-backed sink
///
/// Transport adapters (push gateway, mailer, websocket fan-out) subscribe
/// to the channel; the engine never waits on them.
pub struct BroadcastSink {
    tx: broadcast::Sender<OutboundNotification>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to outbound notifications
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundNotification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn deliver(&self, notification: OutboundNotification) -> AppResult<()> {
        self.tx.send(notification).map_err(|_| {
            AppError::with_message(ErrorCode::NotificationFailed, "no active receivers")
        })?;
        Ok(())
    }
}

/// Sink that records every notification, for tests
#[derive(Default)]
pub struct CollectingSink {
    delivered: parking_lot::Mutex<Vec<OutboundNotification>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<OutboundNotification> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for CollectingSink {
    async fn deliver(&self, notification: OutboundNotification) -> AppResult<()> {
        self.delivered.lock().push(notification);
        Ok(())
    }
}

/// Status-specific buyer message for a tracking update
///
/// Closed mapping from status to template; unknown statuses fall back to a
/// generic "updated to" message. `crop_name` defaults to "crops" when the
/// order has no named line item.
pub fn status_update_message(status: OrderStatus, crop_name: Option<&str>) -> String {
    let crop = crop_name.unwrap_or("crops");
    match status {
        OrderStatus::Confirmed => format!(
            "Your order for {} has been confirmed and is being prepared.",
            crop
        ),
        OrderStatus::Preparing => {
            format!("Your {} order is being prepared for shipment.", crop)
        }
        OrderStatus::Packed => format!(
            "Your {} order has been packed and is ready for pickup/shipment.",
            crop
        ),
        OrderStatus::Shipped => format!(
            "Your {} order is on its way! You'll receive tracking details soon.",
            crop
        ),
        OrderStatus::OutForDelivery => format!(
            "Your {} order is out for delivery and will arrive today.",
            crop
        ),
        OrderStatus::Delivered => format!(
            "Your {} order has been delivered! We hope you enjoy your fresh produce.",
            crop
        ),
        OrderStatus::Cancelled => format!(
            "Your {} order has been cancelled. If you have questions, please contact support.",
            crop
        ),
        OrderStatus::Returned => format!(
            "Your {} order is being returned. Please check your account for details.",
            crop
        ),
        other => format!(
            "Your {} order status has been updated to {}.",
            crop,
            other.label()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages_closed_mapping() {
        let msg = status_update_message(OrderStatus::Delivered, Some("Tomatoes"));
        assert!(msg.contains("Tomatoes"));
        assert!(msg.contains("delivered"));

        let msg = status_update_message(OrderStatus::OutForDelivery, None);
        assert!(msg.contains("crops"));
        assert!(msg.contains("out for delivery"));
    }

    #[test]
    fn test_status_message_fallback() {
        let msg = status_update_message(OrderStatus::Pending, Some("Kale"));
        assert_eq!(msg, "Your Kale order status has been updated to pending.");
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscriber() {
        let sink = BroadcastSink::new();
        let mut rx = sink.subscribe();
        sink.deliver(OutboundNotification::new(
            10,
            NotificationChannel::InApp,
            "hi",
            1,
        ))
        .await
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.recipient, 10);
        assert_eq!(received.message, "hi");
    }

    #[tokio::test]
    async fn test_broadcast_sink_without_receivers_errors() {
        let sink = BroadcastSink::new();
        let result = sink
            .deliver(OutboundNotification::new(
                10,
                NotificationChannel::InApp,
                "hi",
                1,
            ))
            .await;
        assert!(result.is_err());
    }
}
