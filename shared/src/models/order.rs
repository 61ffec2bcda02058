//! Order aggregate with delivery tracking
//!
//! An order owns an append-only tracking log. `current_status` always
//! mirrors the status of the last tracking entry; it is never settable on
//! its own. Lifecycle timestamps are stamped the first time the matching
//! status is reached and never overwritten afterwards.

use crate::types::{CropId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// One day in milliseconds
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Order delivery status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Terminal states accept no further lifecycle progress by policy
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Returned)
    }

    /// Cancellation is only allowed before the order is packed
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Preparing)
    }

    /// Lowercase wire label, used in notification fallback messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How the order reaches the buyer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    #[default]
    HomeDelivery,
    Pickup,
    LocalHub,
    Shipping,
}

/// Where the order originated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSource {
    #[default]
    Web,
    Mobile,
    Recurring,
    Bulk,
}

/// Notification channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    Sms,
    Email,
    Push,
    InApp,
}

/// Delivery outcome of a sent notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    #[default]
    Sent,
    Delivered,
    Failed,
}

/// Audit record of a notification emitted for this order (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub channel: NotificationChannel,
    pub recipient: UserId,
    pub message: String,
    #[serde(default)]
    pub status: NotificationStatus,
    pub timestamp: Timestamp,
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Free-form location attached to a tracking entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrackingLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

/// Driver assigned to a delivery leg
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DriverInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
}

/// One entry in the append-only tracking log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingEntry {
    pub status: OrderStatus,
    /// Server-assigned timestamp (Unix milliseconds)
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<TrackingLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Actor who recorded this entry
    pub updated_by: UserId,
    /// Estimated delivery override for this leg
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_info: Option<DriverInfo>,
}

/// Order line item
///
/// `crop_name` is a snapshot taken at order time so the line survives
/// catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub crop_id: CropId,
    pub crop_name: String,
    pub quantity: i32,
    pub price_per_unit: f64,
    pub total_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// Delivery or pickup address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoCoordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
}

fn default_country() -> String {
    "USA".to_string()
}

/// Agreed delivery window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeliveryWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    /// e.g. "9 AM - 12 PM"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,
}

/// Logistics provider integration data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LogisticsInfo {
    /// e.g. "FedEx", "Local Delivery", "Farmer Direct"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    /// e.g. "standard", "express", "same_day"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_delivery: Option<Timestamp>,
}

/// Buyer quality rating, allowed once the order is delivered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityRating {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub timestamp: Timestamp,
}

/// Order aggregate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Opaque unique order identifier, immutable once set
    pub order_id: String,
    pub buyer_id: UserId,
    pub farmer_id: UserId,
    pub items: Vec<OrderItem>,

    // Monetary breakdown. The invariant
    // total_amount == subtotal + delivery_fee + tax - discount
    // is maintained by the caller at write time; the engine only
    // recomputes it during delivery realization.
    pub subtotal: f64,
    #[serde(default)]
    pub delivery_fee: f64,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub discount: f64,
    pub total_amount: f64,

    pub delivery_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_address: Option<Address>,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_window: Option<DeliveryWindow>,

    /// Append-only tracking log; never mutated or reordered after append
    pub tracking: Vec<TrackingEntry>,
    /// Always equal to the status of the last tracking entry
    pub current_status: OrderStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logistics: Option<LogisticsInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_rating: Option<QualityRating>,
    /// Append-only audit of sent notifications
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,

    // Lifecycle dates. Each stamp is written once when the matching status
    // is first reached and frozen afterwards.
    pub order_date: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Timestamp>,

    #[serde(default)]
    pub order_source: OrderSource,
    #[serde(default)]
    pub is_recurring: bool,
    /// Back-reference to the originating subscription, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    /// Append a tracking entry, mirroring `current_status` and stamping
    /// lifecycle timestamps exactly once.
    ///
    /// Re-entering an already-stamped status (e.g. a returned → re-shipped
    /// correction) does not overwrite the original stamp.
    pub fn append_tracking(&mut self, entry: TrackingEntry) {
        self.current_status = entry.status;
        match entry.status {
            OrderStatus::Confirmed if self.confirmed_at.is_none() => {
                self.confirmed_at = Some(entry.timestamp);
            }
            OrderStatus::Shipped if self.shipped_at.is_none() => {
                self.shipped_at = Some(entry.timestamp);
            }
            OrderStatus::Delivered if self.delivered_at.is_none() => {
                self.delivered_at = Some(entry.timestamp);
            }
            OrderStatus::Cancelled if self.cancelled_at.is_none() => {
                self.cancelled_at = Some(entry.timestamp);
            }
            _ => {}
        }
        self.updated_at = entry.timestamp;
        self.tracking.push(entry);
    }

    /// The most recent tracking entry
    pub fn latest_tracking(&self) -> Option<&TrackingEntry> {
        self.tracking.last()
    }

    /// Re-derive `current_status` from the tracking log tail
    ///
    /// Used when revalidating an aggregate loaded from storage.
    pub fn sync_current_status(&mut self) {
        if let Some(entry) = self.tracking.last() {
            self.current_status = entry.status;
        }
    }

    /// Estimated delivery time, by precedence:
    /// 1. logistics-provider estimate
    /// 2. latest tracking entry's estimate
    /// 3. default offset from `now` keyed by delivery method
    pub fn estimated_delivery(&self, now: Timestamp) -> Timestamp {
        if let Some(logistics) = &self.logistics
            && let Some(estimate) = logistics.estimated_delivery
        {
            return estimate;
        }

        if let Some(entry) = self.tracking.last()
            && let Some(estimate) = entry.estimated_delivery
        {
            return estimate;
        }

        match self.delivery_method {
            DeliveryMethod::Pickup => now + DAY_MS,
            DeliveryMethod::HomeDelivery => now + 2 * DAY_MS,
            DeliveryMethod::Shipping => now + 5 * DAY_MS,
            DeliveryMethod::LocalHub => now + 3 * DAY_MS,
        }
    }

    /// Append a notification audit record
    pub fn record_notification(&mut self, record: NotificationRecord) {
        self.notifications.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: OrderStatus, timestamp: i64) -> TrackingEntry {
        TrackingEntry {
            status,
            timestamp,
            location: None,
            notes: None,
            updated_by: 1,
            estimated_delivery: None,
            driver_info: None,
        }
    }

    fn test_order() -> Order {
        let mut order = Order {
            order_id: "FM-TEST-00001".to_string(),
            buyer_id: 10,
            farmer_id: 20,
            items: vec![OrderItem {
                crop_id: 100,
                crop_name: "Tomatoes".to_string(),
                quantity: 2,
                price_per_unit: 3.5,
                total_price: 7.0,
                special_instructions: None,
            }],
            subtotal: 7.0,
            delivery_fee: 2.0,
            tax: 0.0,
            discount: 0.0,
            total_amount: 9.0,
            delivery_address: Address {
                street: "1 Farm Rd".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                zip_code: "62701".to_string(),
                country: "USA".to_string(),
                coordinates: None,
                delivery_instructions: None,
                contact_phone: None,
            },
            pickup_address: None,
            delivery_method: DeliveryMethod::HomeDelivery,
            delivery_window: None,
            tracking: Vec::new(),
            current_status: OrderStatus::Pending,
            logistics: None,
            quality_rating: None,
            notifications: Vec::new(),
            order_date: 1_000,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            order_source: OrderSource::Web,
            is_recurring: false,
            subscription_id: None,
            special_requests: None,
            created_at: 1_000,
            updated_at: 1_000,
        };
        order.append_tracking(entry(OrderStatus::Pending, 1_000));
        order
    }

    #[test]
    fn test_current_status_mirrors_latest_entry() {
        let mut order = test_order();
        for (status, ts) in [
            (OrderStatus::Confirmed, 2_000),
            (OrderStatus::Preparing, 3_000),
            (OrderStatus::Shipped, 4_000),
            (OrderStatus::Delivered, 5_000),
        ] {
            order.append_tracking(entry(status, ts));
            assert_eq!(order.current_status, status);
            assert_eq!(order.latest_tracking().unwrap().status, status);
        }
    }

    #[test]
    fn test_lifecycle_stamps_write_once() {
        let mut order = test_order();
        order.append_tracking(entry(OrderStatus::Delivered, 5_000));
        assert_eq!(order.delivered_at, Some(5_000));

        // returned after delivered: status moves, stamp stays frozen
        order.append_tracking(entry(OrderStatus::Returned, 6_000));
        assert_eq!(order.current_status, OrderStatus::Returned);
        assert_eq!(order.delivered_at, Some(5_000));

        // re-delivery does not overwrite either
        order.append_tracking(entry(OrderStatus::Delivered, 7_000));
        assert_eq!(order.delivered_at, Some(5_000));
    }

    #[test]
    fn test_shipped_and_cancelled_stamps() {
        let mut order = test_order();
        order.append_tracking(entry(OrderStatus::Shipped, 4_000));
        assert_eq!(order.shipped_at, Some(4_000));

        let mut second = test_order();
        second.append_tracking(entry(OrderStatus::Cancelled, 9_000));
        assert_eq!(second.cancelled_at, Some(9_000));
        assert_eq!(second.current_status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_estimated_delivery_precedence() {
        let mut order = test_order();
        let now = 100_000;

        // 3. method default: home delivery is +2 days
        assert_eq!(order.estimated_delivery(now), now + 2 * DAY_MS);

        // 2. latest tracking entry estimate wins over the default
        let mut tracked = entry(OrderStatus::Shipped, 4_000);
        tracked.estimated_delivery = Some(777_777);
        order.append_tracking(tracked);
        assert_eq!(order.estimated_delivery(now), 777_777);

        // 1. logistics-provider estimate wins over everything
        order.logistics = Some(LogisticsInfo {
            carrier: Some("Farmer Direct".to_string()),
            estimated_delivery: Some(555_555),
            ..Default::default()
        });
        assert_eq!(order.estimated_delivery(now), 555_555);
    }

    #[test]
    fn test_estimated_delivery_method_defaults() {
        let now = 0;
        for (method, expected) in [
            (DeliveryMethod::Pickup, DAY_MS),
            (DeliveryMethod::HomeDelivery, 2 * DAY_MS),
            (DeliveryMethod::Shipping, 5 * DAY_MS),
            (DeliveryMethod::LocalHub, 3 * DAY_MS),
        ] {
            let mut order = test_order();
            order.delivery_method = method;
            order.tracking.clear();
            assert_eq!(order.estimated_delivery(now), expected);
        }
    }

    #[test]
    fn test_cancellable_statuses() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Confirmed.is_cancellable());
        assert!(OrderStatus::Preparing.is_cancellable());
        assert!(!OrderStatus::Packed.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
        assert!(!OrderStatus::Delivered.is_cancellable());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Returned.is_terminal());
        assert!(!OrderStatus::OutForDelivery.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"OUT_FOR_DELIVERY\"");
        let status: OrderStatus = serde_json::from_str("\"DELIVERED\"").unwrap();
        assert_eq!(status, OrderStatus::Delivered);
    }
}
