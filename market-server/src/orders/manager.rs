//! OrdersManager — order lifecycle and tracking-log processing
//!
//! Every mutation follows the same shape:
//!
//! ```text
//! operation(order_id, ..., actor)
//!     ├─ 1. Validate input
//!     ├─ 2. Acquire per-order lock
//!     ├─ 3. Load aggregate (NotFound if unresolvable)
//!     ├─ 4. Check permission (actor is trusted, roles are not)
//!     ├─ 5. Check status precondition (StateConflict otherwise)
//!     ├─ 6. Mutate the aggregate
//!     ├─ 7. Emit buyer notification (fire-and-forget, failures swallowed)
//!     └─ 8. Persist and return the updated order
//! ```
//!
//! Mutations on distinct orders proceed in parallel; the per-order lock
//! only serializes read-modify-write sequences against the same aggregate.

use crate::notify::{NotificationSink, OutboundNotification, status_update_message};
use crate::orders::money;
use crate::store::OrderStore;
use crate::utils::validation::{
    self, MAX_NOTE_LEN, MAX_RATING_PHOTOS, MAX_SHORT_TEXT_LEN, validate_optional_text,
    validate_required_text,
};
use crate::utils::{AppError, AppResult, time};
use chrono::NaiveDate;
use chrono_tz::Tz;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::ErrorCode;
use shared::models::{
    Address, DeliveryMethod, DeliveryWindow, DriverInfo, LogisticsInfo, NotificationChannel,
    NotificationRecord, NotificationStatus, Order, OrderItem, OrderSource, OrderStatus,
    QualityRating, TrackingEntry, TrackingLocation,
};
use shared::types::{Actor, CropId, Timestamp, UserId};
use shared::util::{now_millis, order_token};
use std::sync::Arc;
use tokio::sync::Mutex;
use validator::Validate;

/// Line item input for order creation
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct OrderItemInput {
    pub crop_id: CropId,
    #[validate(length(min = 1, max = 200, message = "crop_name must be 1-200 chars"))]
    pub crop_name: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(range(min = 0.0, message = "price_per_unit must be non-negative"))]
    pub price_per_unit: f64,
    pub special_instructions: Option<String>,
}

/// Input for order creation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub farmer_id: UserId,
    #[validate(length(max = 100, message = "order is limited to 100 items"), nested)]
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "delivery_fee must be non-negative"))]
    pub delivery_fee: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "tax must be non-negative"))]
    pub tax: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "discount must be non-negative"))]
    pub discount: f64,
    pub delivery_address: Address,
    pub pickup_address: Option<Address>,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    pub delivery_window: Option<DeliveryWindow>,
    pub logistics: Option<LogisticsInfo>,
    pub special_requests: Option<String>,
}

/// Input for a tracking-log append
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingUpdateInput {
    pub status: OrderStatus,
    pub location: Option<TrackingLocation>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<Timestamp>,
    pub driver_info: Option<DriverInfo>,
}

/// Pre-priced order materialized from a subscription delivery
///
/// The subscription engine computes the monetary breakdown; this spec
/// carries it into order creation unchanged.
#[derive(Debug, Clone)]
pub struct RecurringOrderSpec {
    pub buyer_id: UserId,
    pub farmer_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub discount: f64,
    pub total_amount: f64,
    pub delivery_address: Address,
    pub subscription_id: String,
}

/// OrdersManager for order-tracking operations
pub struct OrdersManager {
    store: Arc<dyn OrderStore>,
    sink: Arc<dyn NotificationSink>,
    /// Business timezone for day-window queries
    tz: Tz,
    /// Per-order mutation locks
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OrdersManager {
    pub fn new(store: Arc<dyn OrderStore>, sink: Arc<dyn NotificationSink>, tz: Tz) -> Self {
        Self {
            store,
            sink,
            tz,
            locks: DashMap::new(),
        }
    }

    fn lock_handle(&self, order_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(order_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, order_id: &str) -> AppResult<Order> {
        self.store.get(order_id).await?.ok_or_else(|| {
            AppError::with_message(
                ErrorCode::OrderNotFound,
                format!("Order not found: {}", order_id),
            )
        })
    }

    /// Create a new order for the acting buyer
    ///
    /// Synthesizes the initial `pending` tracking entry so `current_status`
    /// mirrors the log from the first write on.
    pub async fn create(&self, input: CreateOrderInput, actor: Actor) -> AppResult<Order> {
        if input.items.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty));
        }
        validation::validate_input(&input)?;
        validate_address(&input.delivery_address)?;
        if let Some(pickup) = &input.pickup_address {
            validate_address(pickup)?;
        }
        for item in &input.items {
            validate_optional_text(&item.special_instructions, "special_instructions", MAX_NOTE_LEN)?;
            money::validate_amount(item.price_per_unit, "price_per_unit")?;
        }
        validate_optional_text(&input.special_requests, "special_requests", MAX_NOTE_LEN)?;
        money::validate_amount(input.delivery_fee, "delivery_fee")?;
        money::validate_amount(input.tax, "tax")?;
        money::validate_amount(input.discount, "discount")?;

        let now = now_millis();
        let items: Vec<OrderItem> = input
            .items
            .iter()
            .map(|item| OrderItem {
                crop_id: item.crop_id,
                crop_name: item.crop_name.clone(),
                quantity: item.quantity,
                price_per_unit: item.price_per_unit,
                total_price: money::line_total(item.quantity, item.price_per_unit),
                special_instructions: item.special_instructions.clone(),
            })
            .collect();

        let subtotal: Decimal = items.iter().map(|i| money::to_decimal(i.total_price)).sum();
        let total = subtotal + money::to_decimal(input.delivery_fee) + money::to_decimal(input.tax)
            - money::to_decimal(input.discount);

        let mut order = Order {
            order_id: order_token(),
            buyer_id: actor.user_id,
            farmer_id: input.farmer_id,
            items,
            subtotal: money::to_f64(subtotal),
            delivery_fee: money::round2(input.delivery_fee),
            tax: money::round2(input.tax),
            discount: money::round2(input.discount),
            total_amount: money::to_f64(total),
            delivery_address: input.delivery_address,
            pickup_address: input.pickup_address,
            delivery_method: input.delivery_method,
            delivery_window: input.delivery_window,
            tracking: Vec::new(),
            current_status: OrderStatus::Pending,
            logistics: input.logistics,
            quality_rating: None,
            notifications: Vec::new(),
            order_date: now,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            order_source: OrderSource::Web,
            is_recurring: false,
            subscription_id: None,
            special_requests: input.special_requests,
            created_at: now,
            updated_at: now,
        };
        order.append_tracking(TrackingEntry {
            status: OrderStatus::Pending,
            timestamp: now,
            location: None,
            notes: None,
            updated_by: actor.user_id,
            estimated_delivery: None,
            driver_info: None,
        });

        self.store.insert(order.clone()).await?;
        tracing::info!(order_id = %order.order_id, buyer_id = order.buyer_id, "Order created");
        Ok(order)
    }

    /// Materialize a pre-priced recurring order from a subscription
    pub async fn create_recurring(
        &self,
        spec: RecurringOrderSpec,
        actor: Actor,
    ) -> AppResult<Order> {
        let now = now_millis();
        let mut order = Order {
            order_id: order_token(),
            buyer_id: spec.buyer_id,
            farmer_id: spec.farmer_id,
            items: spec.items,
            subtotal: spec.subtotal,
            delivery_fee: spec.delivery_fee,
            tax: 0.0,
            discount: spec.discount,
            total_amount: spec.total_amount,
            delivery_address: spec.delivery_address,
            pickup_address: None,
            delivery_method: DeliveryMethod::HomeDelivery,
            delivery_window: None,
            tracking: Vec::new(),
            current_status: OrderStatus::Pending,
            logistics: None,
            quality_rating: None,
            notifications: Vec::new(),
            order_date: now,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            order_source: OrderSource::Recurring,
            is_recurring: true,
            subscription_id: Some(spec.subscription_id),
            special_requests: None,
            created_at: now,
            updated_at: now,
        };
        order.append_tracking(TrackingEntry {
            status: OrderStatus::Pending,
            timestamp: now,
            location: None,
            notes: None,
            updated_by: actor.user_id,
            estimated_delivery: None,
            driver_info: None,
        });

        self.store.insert(order.clone()).await?;
        tracing::info!(
            order_id = %order.order_id,
            subscription_id = ?order.subscription_id,
            "Recurring order created"
        );
        Ok(order)
    }

    /// Read an order; visible to its parties and administrators only
    pub async fn get(&self, order_id: &str, actor: Actor) -> AppResult<Order> {
        let order = self.load(order_id).await?;
        if !actor.is_party_or_admin(&[order.buyer_id, order.farmer_id]) {
            return Err(AppError::permission_denied("Access denied"));
        }
        Ok(order)
    }

    /// Append a tracking update and notify the buyer
    ///
    /// Farmers of record (and administrators) only. The server assigns the
    /// entry timestamp; `current_status` always mirrors the appended entry.
    pub async fn add_tracking_update(
        &self,
        order_id: &str,
        input: TrackingUpdateInput,
        actor: Actor,
    ) -> AppResult<Order> {
        validate_optional_text(&input.notes, "notes", MAX_NOTE_LEN)?;

        let handle = self.lock_handle(order_id);
        let _guard = handle.lock().await;

        let mut order = self.load(order_id).await?;
        if order.farmer_id != actor.user_id && !actor.is_admin() {
            return Err(AppError::permission_denied(
                "Only the farmer of record can update tracking",
            ));
        }

        self.append_and_notify(&mut order, input, actor).await;
        self.store.update(order.clone()).await?;
        tracing::info!(order_id = %order.order_id, status = %order.current_status, "Tracking updated");
        Ok(order)
    }

    /// Cancel an order
    ///
    /// Allowed for either party (or an administrator) while the order is
    /// still pending, confirmed, or preparing. Internally appends a
    /// `cancelled` tracking entry.
    pub async fn cancel(
        &self,
        order_id: &str,
        reason: Option<String>,
        actor: Actor,
    ) -> AppResult<Order> {
        validate_optional_text(&reason, "reason", MAX_NOTE_LEN)?;

        let handle = self.lock_handle(order_id);
        let _guard = handle.lock().await;

        let mut order = self.load(order_id).await?;
        if !actor.is_party_or_admin(&[order.buyer_id, order.farmer_id]) {
            return Err(AppError::permission_denied("Access denied"));
        }
        if !order.current_status.is_cancellable() {
            return Err(AppError::with_message(
                ErrorCode::OrderNotCancellable,
                format!(
                    "Order cannot be cancelled in {} status",
                    order.current_status
                ),
            ));
        }

        let input = TrackingUpdateInput {
            status: OrderStatus::Cancelled,
            location: None,
            notes: reason.or_else(|| Some("Order cancelled".to_string())),
            estimated_delivery: None,
            driver_info: None,
        };
        self.append_and_notify(&mut order, input, actor).await;
        self.store.update(order.clone()).await?;
        tracing::info!(order_id = %order.order_id, "Order cancelled");
        Ok(order)
    }

    /// Rate order quality
    ///
    /// Buyers only, and only once the order is delivered. A later call
    /// overwrites the rating (unlike lifecycle timestamps).
    pub async fn rate(
        &self,
        order_id: &str,
        rating: u8,
        feedback: Option<String>,
        photos: Vec<String>,
        actor: Actor,
    ) -> AppResult<Order> {
        validation::validate_rating(rating)?;
        validate_optional_text(&feedback, "feedback", MAX_NOTE_LEN)?;
        if photos.len() > MAX_RATING_PHOTOS {
            return Err(AppError::validation(format!(
                "at most {} photos allowed",
                MAX_RATING_PHOTOS
            )));
        }

        let handle = self.lock_handle(order_id);
        let _guard = handle.lock().await;

        let mut order = self.load(order_id).await?;
        if order.buyer_id != actor.user_id {
            return Err(AppError::permission_denied("Only buyers can rate orders"));
        }
        if order.current_status != OrderStatus::Delivered {
            return Err(AppError::with_message(
                ErrorCode::OrderNotRateable,
                "Can only rate delivered orders",
            ));
        }

        let now = now_millis();
        order.quality_rating = Some(QualityRating {
            rating,
            feedback,
            photos,
            timestamp: now,
        });
        order.updated_at = now;
        self.store.update(order.clone()).await?;
        Ok(order)
    }

    /// Estimated delivery time for an order
    pub async fn estimated_delivery(&self, order_id: &str) -> AppResult<Timestamp> {
        let order = self.load(order_id).await?;
        Ok(order.estimated_delivery(now_millis()))
    }

    /// Look up an order by its logistics tracking number
    pub async fn find_by_tracking_number(&self, tracking_number: &str) -> AppResult<Order> {
        validate_required_text(tracking_number, "tracking_number", MAX_SHORT_TEXT_LEN)?;
        self.store
            .find_by_tracking_number(tracking_number)
            .await?
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::OrderNotFound,
                    format!("Order not found with tracking number: {}", tracking_number),
                )
            })
    }

    /// Orders scheduled for delivery on the given business day
    ///
    /// Defaults to `out_for_delivery` when no status filter is supplied;
    /// results are ascending by delivery window start.
    pub async fn orders_for_delivery_window(
        &self,
        date: NaiveDate,
        status: Option<OrderStatus>,
    ) -> AppResult<Vec<Order>> {
        let start = time::day_start_millis(date, self.tz);
        let end = time::day_end_millis(date, self.tz);
        let status = status.unwrap_or(OrderStatus::OutForDelivery);
        self.store.for_delivery_window(start, end, status).await
    }

    /// All orders for one side of the marketplace, newest first
    pub async fn list_for_actor(&self, actor: Actor) -> AppResult<Vec<Order>> {
        match actor.role {
            shared::types::Role::Farmer => self.store.by_farmer(actor.user_id).await,
            _ => self.store.by_buyer(actor.user_id).await,
        }
    }

    /// Append the entry, stamp lifecycle fields, and emit the buyer
    /// notification. Notification failures are logged and swallowed — the
    /// tracking append must never roll back on transport problems.
    async fn append_and_notify(&self, order: &mut Order, input: TrackingUpdateInput, actor: Actor) {
        let now = now_millis();
        let status = input.status;
        order.append_tracking(TrackingEntry {
            status,
            timestamp: now,
            location: input.location,
            notes: input.notes,
            updated_by: actor.user_id,
            estimated_delivery: input.estimated_delivery,
            driver_info: input.driver_info,
        });

        let crop_name = order.items.first().map(|i| i.crop_name.as_str());
        let message = status_update_message(status, crop_name);
        let mut record = NotificationRecord {
            channel: NotificationChannel::InApp,
            recipient: order.buyer_id,
            message: message.clone(),
            status: NotificationStatus::Sent,
            timestamp: now,
        };
        let outbound =
            OutboundNotification::new(order.buyer_id, NotificationChannel::InApp, message, now);
        if let Err(e) = self.sink.deliver(outbound).await {
            tracing::warn!(order_id = %order.order_id, error = %e, "Notification delivery failed");
            record.status = NotificationStatus::Failed;
        }
        order.record_notification(record);
    }
}

fn validate_address(address: &Address) -> AppResult<()> {
    validate_required_text(&address.street, "street", validation::MAX_ADDRESS_LEN)?;
    validate_required_text(&address.city, "city", validation::MAX_NAME_LEN)?;
    validate_required_text(&address.state, "state", validation::MAX_NAME_LEN)?;
    validate_required_text(&address.zip_code, "zip_code", MAX_SHORT_TEXT_LEN)?;
    validate_optional_text(&address.contact_phone, "contact_phone", MAX_SHORT_TEXT_LEN)?;
    Ok(())
}
