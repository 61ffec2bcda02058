//! SubscriptionsManager — recurring-delivery lifecycle processing
//!
//! Owns pause/resume accounting, cancellation bookkeeping, delivery
//! realization (subscription → concrete order), satisfaction scoring, and
//! the due/upcoming read side.
//!
//! # Delivery realization
//!
//! `process_delivery` performs the only cross-aggregate write pair in the
//! core: create the order, then append to the subscription's delivery
//! history and advance the cursor. The two writes are one logical unit —
//! if the subscription write fails after the order write succeeded, the
//! orphaned order is logged at error level for manual reconciliation
//! rather than silently double-delivering on retry.

use crate::catalog::CropCatalog;
use crate::orders::{OrdersManager, RecurringOrderSpec};
use crate::orders::money;
use crate::store::SubscriptionStore;
use crate::subscriptions::analytics::{self, SubscriptionAnalytics, Timeframe};
use crate::subscriptions::scheduler;
use crate::utils::validation::{
    self, MAX_NOTE_LEN, validate_optional_text, validate_required_text,
};
use crate::utils::{AppError, AppResult, time};
use chrono::NaiveDate;
use chrono_tz::Tz;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::ErrorCode;
use shared::models::{
    Address, Budget, DeliveredItem, DeliveryPreferences, Flexibility, Frequency,
    NotificationPrefs, Order, OrderItem, Pricing, RecurringItem, SeasonalBounds, Subscription,
    SubscriptionStatus,
};
use shared::types::{Actor, CropId, Role, Timestamp, UserId};
use shared::util::{now_millis, subscription_token};
use std::sync::Arc;
use tokio::sync::Mutex;
use validator::Validate;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Recurring item template input
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RecurringItemInput {
    pub crop_id: CropId,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(range(min = 0.0, message = "max_price_per_unit must be non-negative"))]
    pub max_price_per_unit: f64,
    #[serde(default)]
    pub substitution_allowed: bool,
    #[serde(default)]
    pub acceptable_substitutes: Vec<CropId>,
    pub seasonal: Option<SeasonalBounds>,
    pub special_instructions: Option<String>,
}

/// Input for subscription creation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSubscriptionInput {
    pub farmer_id: UserId,
    #[validate(length(min = 1, max = 100, message = "title must be 1-100 chars"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 100, message = "subscription is limited to 100 items"), nested)]
    pub items: Vec<RecurringItemInput>,
    pub frequency: Frequency,
    pub custom_frequency_days: Option<u32>,
    pub delivery_address: Address,
    #[serde(default)]
    pub delivery_window: DeliveryPreferences,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub pricing: Pricing,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    /// When unset, the initial cursor is computed from the scheduler
    pub next_delivery_date: Option<Timestamp>,
    #[serde(default)]
    pub flexibility: Flexibility,
    #[serde(default)]
    pub notifications: NotificationPrefs,
    pub customer_notes: Option<String>,
    pub farmer_notes: Option<String>,
}

/// Allowed-field patch for subscription updates
///
/// A frequency change triggers a reschedule of the cursor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSubscriptionInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items: Option<Vec<RecurringItemInput>>,
    pub delivery_address: Option<Address>,
    pub delivery_window: Option<DeliveryPreferences>,
    pub budget: Option<Budget>,
    pub flexibility: Option<Flexibility>,
    pub notifications: Option<NotificationPrefs>,
    pub customer_notes: Option<String>,
    pub farmer_notes: Option<String>,
    pub frequency: Option<Frequency>,
    pub custom_frequency_days: Option<u32>,
}

/// SubscriptionsManager for recurring-delivery operations
pub struct SubscriptionsManager {
    store: Arc<dyn SubscriptionStore>,
    catalog: Arc<dyn CropCatalog>,
    orders: Arc<OrdersManager>,
    /// Business timezone for day boundaries and avoid-date matching
    tz: Tz,
    /// Per-subscription mutation locks
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SubscriptionsManager {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        catalog: Arc<dyn CropCatalog>,
        orders: Arc<OrdersManager>,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            catalog,
            orders,
            tz,
            locks: DashMap::new(),
        }
    }

    fn lock_handle(&self, subscription_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(subscription_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, subscription_id: &str) -> AppResult<Subscription> {
        self.store.get(subscription_id).await?.ok_or_else(|| {
            AppError::with_message(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription not found: {}", subscription_id),
            )
        })
    }

    fn advance_cursor(&self, subscription: &mut Subscription, now: Timestamp) -> AppResult<()> {
        let anchor = subscription.next_delivery_date.unwrap_or(now);
        let next = scheduler::next_occurrence(
            anchor,
            subscription.frequency,
            subscription.custom_frequency_days,
            &subscription.delivery_window.avoid_dates,
            self.tz,
        )?;
        subscription.next_delivery_date = Some(next);
        Ok(())
    }

    /// Create a new subscription for the acting customer
    pub async fn create(&self, input: CreateSubscriptionInput, actor: Actor) -> AppResult<Subscription> {
        if input.items.is_empty() {
            return Err(AppError::validation("subscription must have at least one item"));
        }
        validation::validate_input(&input)?;
        validate_address_fields(&input.delivery_address)?;
        validate_pricing(&input.pricing)?;
        validate_optional_text(&input.description, "description", MAX_NOTE_LEN)?;
        validate_optional_text(&input.customer_notes, "customer_notes", MAX_NOTE_LEN)?;
        validate_optional_text(&input.farmer_notes, "farmer_notes", MAX_NOTE_LEN)?;
        if input.frequency == Frequency::Custom && input.custom_frequency_days.is_none() {
            return Err(AppError::with_message(
                ErrorCode::CustomFrequencyMissing,
                "custom frequency requires custom_frequency_days",
            ));
        }

        let now = now_millis();
        let mut subscription = Subscription {
            subscription_id: subscription_token(),
            customer_id: actor.user_id,
            farmer_id: input.farmer_id,
            title: input.title,
            description: input.description,
            items: input.items.iter().map(to_recurring_item).collect(),
            frequency: input.frequency,
            custom_frequency_days: input.custom_frequency_days,
            delivery_address: input.delivery_address,
            delivery_window: input.delivery_window,
            status: SubscriptionStatus::Active,
            budget: input.budget,
            pricing: input.pricing,
            start_date: input.start_date.unwrap_or(now),
            end_date: input.end_date,
            next_delivery_date: input.next_delivery_date,
            last_delivery_date: None,
            delivery_history: Vec::new(),
            flexibility: input.flexibility,
            notifications: input.notifications,
            metrics: Default::default(),
            customer_notes: input.customer_notes,
            farmer_notes: input.farmer_notes,
            pause_history: Vec::new(),
            cancellation_details: None,
            created_at: now,
            updated_at: now,
        };

        if subscription.next_delivery_date.is_none() {
            self.advance_cursor(&mut subscription, now)?;
        }

        self.store.insert(subscription.clone()).await?;
        tracing::info!(
            subscription_id = %subscription.subscription_id,
            customer_id = subscription.customer_id,
            "Subscription created"
        );
        Ok(subscription)
    }

    /// Read a subscription; visible to its parties and administrators only
    pub async fn get(&self, subscription_id: &str, actor: Actor) -> AppResult<Subscription> {
        let subscription = self.load(subscription_id).await?;
        check_party(&subscription, actor)?;
        Ok(subscription)
    }

    /// Patch allowed fields; a frequency change reschedules the cursor
    pub async fn update(
        &self,
        subscription_id: &str,
        patch: UpdateSubscriptionInput,
        actor: Actor,
    ) -> AppResult<Subscription> {
        let handle = self.lock_handle(subscription_id);
        let _guard = handle.lock().await;

        let mut subscription = self.load(subscription_id).await?;
        check_party(&subscription, actor)?;

        if let Some(title) = patch.title {
            validate_required_text(&title, "title", 100)?;
            subscription.title = title;
        }
        if let Some(description) = patch.description {
            validate_required_text(&description, "description", MAX_NOTE_LEN)?;
            subscription.description = Some(description);
        }
        if let Some(items) = patch.items {
            if items.is_empty() {
                return Err(AppError::validation("subscription must have at least one item"));
            }
            for item in &items {
                validation::validate_input(item)?;
            }
            subscription.items = items.iter().map(to_recurring_item).collect();
        }
        if let Some(address) = patch.delivery_address {
            validate_address_fields(&address)?;
            subscription.delivery_address = address;
        }
        if let Some(window) = patch.delivery_window {
            subscription.delivery_window = window;
        }
        if let Some(budget) = patch.budget {
            subscription.budget = budget;
        }
        if let Some(flexibility) = patch.flexibility {
            subscription.flexibility = flexibility;
        }
        if let Some(notifications) = patch.notifications {
            subscription.notifications = notifications;
        }
        if let Some(notes) = patch.customer_notes {
            validate_optional_text(&Some(notes.clone()), "customer_notes", MAX_NOTE_LEN)?;
            subscription.customer_notes = Some(notes);
        }
        if let Some(notes) = patch.farmer_notes {
            validate_optional_text(&Some(notes.clone()), "farmer_notes", MAX_NOTE_LEN)?;
            subscription.farmer_notes = Some(notes);
        }

        let now = now_millis();
        if let Some(frequency) = patch.frequency {
            subscription.frequency = frequency;
            if let Some(days) = patch.custom_frequency_days {
                subscription.custom_frequency_days = Some(days);
            }
            // cadence changed: recompute the cursor forward from where it was
            self.advance_cursor(&mut subscription, now)?;
        }
        subscription.updated_at = now;

        self.store.update(subscription.clone()).await?;
        Ok(subscription)
    }

    /// Pause an active subscription
    pub async fn pause(
        &self,
        subscription_id: &str,
        reason: Option<String>,
        actor: Actor,
    ) -> AppResult<Subscription> {
        validate_optional_text(&reason, "reason", MAX_NOTE_LEN)?;

        let handle = self.lock_handle(subscription_id);
        let _guard = handle.lock().await;

        let mut subscription = self.load(subscription_id).await?;
        check_party(&subscription, actor)?;
        if subscription.status != SubscriptionStatus::Active {
            return Err(AppError::with_message(
                ErrorCode::SubscriptionNotActive,
                "Only active subscriptions can be paused",
            ));
        }

        subscription.record_pause(reason, actor.user_id, now_millis());
        self.store.update(subscription.clone()).await?;
        tracing::info!(subscription_id = %subscription.subscription_id, "Subscription paused");
        Ok(subscription)
    }

    /// Resume a paused subscription
    ///
    /// Closes the open pause record, adds the elapsed whole days (ceiling)
    /// to `metrics.paused_days`, and recomputes the cursor anchored at the
    /// pre-pause cursor — paused time is not credited toward the cadence.
    pub async fn resume(&self, subscription_id: &str, actor: Actor) -> AppResult<Subscription> {
        let handle = self.lock_handle(subscription_id);
        let _guard = handle.lock().await;

        let mut subscription = self.load(subscription_id).await?;
        check_party(&subscription, actor)?;
        if subscription.status != SubscriptionStatus::Paused {
            return Err(AppError::with_message(
                ErrorCode::SubscriptionNotPaused,
                "Only paused subscriptions can be resumed",
            ));
        }

        let now = now_millis();
        let paused_days = subscription.close_pause(now);
        self.advance_cursor(&mut subscription, now)?;

        self.store.update(subscription.clone()).await?;
        tracing::info!(
            subscription_id = %subscription.subscription_id,
            paused_days,
            next_delivery = ?subscription.next_delivery_date,
            "Subscription resumed"
        );
        Ok(subscription)
    }

    /// Cancel a subscription
    ///
    /// A second cancel is rejected with a state conflict rather than
    /// silently accepted — double-refund bookkeeping must not happen.
    pub async fn cancel(
        &self,
        subscription_id: &str,
        reason: Option<String>,
        refund_amount: f64,
        actor: Actor,
    ) -> AppResult<Subscription> {
        validate_optional_text(&reason, "reason", MAX_NOTE_LEN)?;
        money::validate_amount(refund_amount, "refund_amount")?;

        let handle = self.lock_handle(subscription_id);
        let _guard = handle.lock().await;

        let mut subscription = self.load(subscription_id).await?;
        check_party(&subscription, actor)?;
        if subscription.status == SubscriptionStatus::Cancelled {
            return Err(AppError::with_message(
                ErrorCode::SubscriptionAlreadyCancelled,
                "Subscription is already cancelled",
            ));
        }

        subscription.record_cancellation(reason, actor.user_id, refund_amount, now_millis());
        self.store.update(subscription.clone()).await?;
        tracing::info!(subscription_id = %subscription.subscription_id, "Subscription cancelled");
        Ok(subscription)
    }

    /// Realize one delivery: create a concrete order and advance the cursor
    ///
    /// Farmers of record (and administrators) only. Prices are resolved
    /// live from the catalog — the stored per-item ceiling is validated,
    /// and a breach is logged, but the live price is charged (source
    /// parity; see DESIGN.md).
    pub async fn process_delivery(&self, subscription_id: &str, actor: Actor) -> AppResult<Order> {
        let handle = self.lock_handle(subscription_id);
        let _guard = handle.lock().await;

        let mut subscription = self.load(subscription_id).await?;
        if subscription.farmer_id != actor.user_id && !actor.is_admin() {
            return Err(AppError::permission_denied(
                "Only the farmer can process subscription deliveries",
            ));
        }
        if subscription.status != SubscriptionStatus::Active {
            return Err(AppError::with_message(
                ErrorCode::SubscriptionNotActive,
                "Subscription is not active",
            ));
        }

        // Resolve live prices before any write happens
        let mut order_items = Vec::with_capacity(subscription.items.len());
        let mut delivered_items = Vec::with_capacity(subscription.items.len());
        let mut subtotal = Decimal::ZERO;
        for item in &subscription.items {
            let quote = self.catalog.quote(item.crop_id).await?;
            if !quote.available {
                tracing::warn!(
                    subscription_id = %subscription.subscription_id,
                    crop_id = item.crop_id,
                    "Crop currently marked unavailable, charging listed price anyway"
                );
            }
            if quote.price > item.max_price_per_unit {
                tracing::warn!(
                    subscription_id = %subscription.subscription_id,
                    crop_id = item.crop_id,
                    live_price = quote.price,
                    ceiling = item.max_price_per_unit,
                    "Live price exceeds item ceiling"
                );
            }
            let line = money::line_total(item.quantity, quote.price);
            subtotal += money::to_decimal(line);
            order_items.push(OrderItem {
                crop_id: item.crop_id,
                crop_name: quote.name.clone(),
                quantity: item.quantity,
                price_per_unit: quote.price,
                total_price: line,
                special_instructions: item.special_instructions.clone(),
            });
            delivered_items.push(DeliveredItem {
                crop_id: item.crop_id,
                quantity: item.quantity,
                price: quote.price,
            });
        }

        let discount = money::percent_of(subtotal, subscription.pricing.discount_percentage);
        let delivery_fee = money::to_decimal(subscription.pricing.base_delivery_fee);
        let total = subtotal + delivery_fee - discount;
        let total_f64 = money::to_f64(total);

        // First write: materialize the order
        let order = self
            .orders
            .create_recurring(
                RecurringOrderSpec {
                    buyer_id: subscription.customer_id,
                    farmer_id: subscription.farmer_id,
                    items: order_items,
                    subtotal: money::to_f64(subtotal),
                    delivery_fee: money::to_f64(delivery_fee),
                    discount: money::to_f64(discount),
                    total_amount: total_f64,
                    delivery_address: subscription.delivery_address.clone(),
                    subscription_id: subscription.subscription_id.clone(),
                },
                actor,
            )
            .await?;

        // Second write: delivery history, metrics, cursor. Failure here
        // leaves an orphaned order — log it for manual reconciliation.
        let now = now_millis();
        let result: AppResult<()> = (|| {
            subscription.record_delivery(
                order.order_id.clone(),
                delivered_items,
                total_f64,
                now,
            );
            self.advance_cursor(&mut subscription, now)
        })();
        let result = match result {
            Ok(()) => self.store.update(subscription.clone()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!(
                order_id = %order.order_id,
                subscription_id = %subscription.subscription_id,
                error = %e,
                "Orphaned order: subscription update failed after order creation, manual reconciliation required"
            );
            return Err(e);
        }

        tracing::info!(
            subscription_id = %subscription.subscription_id,
            order_id = %order.order_id,
            total = total_f64,
            next_delivery = ?subscription.next_delivery_date,
            "Delivery processed"
        );
        Ok(order)
    }

    /// Rate the most recent delivery
    ///
    /// Customers only. Only the latest delivery is rateable through this
    /// path; the satisfaction score is recomputed as a sparse mean over
    /// all rated deliveries.
    pub async fn rate_delivery(
        &self,
        subscription_id: &str,
        rating: u8,
        feedback: Option<String>,
        actor: Actor,
    ) -> AppResult<Subscription> {
        validation::validate_rating(rating)?;
        validate_optional_text(&feedback, "feedback", MAX_NOTE_LEN)?;

        let handle = self.lock_handle(subscription_id);
        let _guard = handle.lock().await;

        let mut subscription = self.load(subscription_id).await?;
        if subscription.customer_id != actor.user_id {
            return Err(AppError::permission_denied(
                "Only customers can rate deliveries",
            ));
        }

        if !subscription.rate_latest_delivery(rating, feedback, now_millis()) {
            return Err(AppError::new(ErrorCode::DeliveryNotFound));
        }
        self.store.update(subscription.clone()).await?;
        Ok(subscription)
    }

    /// Active subscriptions due on or before the end of the given business
    /// day, ascending by next delivery date
    pub async fn due(&self, date: Option<NaiveDate>) -> AppResult<Vec<Subscription>> {
        let date = date.unwrap_or_else(|| time::local_date(now_millis(), self.tz));
        let cutoff = time::day_end_millis(date, self.tz) - 1;
        self.store.due(cutoff).await
    }

    /// Active subscriptions whose next delivery falls within the next
    /// `days_ahead` days, ascending by next delivery date
    pub async fn upcoming(&self, days_ahead: i64) -> AppResult<Vec<Subscription>> {
        let now = now_millis();
        self.store.upcoming(now, now + days_ahead * DAY_MS).await
    }

    /// Permission filter for query results — farmers see their own,
    /// customers see their own, administrators see everything. Applied by
    /// the route layer on top of the raw query.
    pub fn filter_for_actor(subscriptions: Vec<Subscription>, actor: Actor) -> Vec<Subscription> {
        match actor.role {
            Role::Admin => subscriptions,
            Role::Farmer => subscriptions
                .into_iter()
                .filter(|s| s.farmer_id == actor.user_id)
                .collect(),
            Role::Customer => subscriptions
                .into_iter()
                .filter(|s| s.customer_id == actor.user_id)
                .collect(),
        }
    }

    /// Subscription analytics over the actor's visible subscriptions
    pub async fn analytics(
        &self,
        actor: Actor,
        timeframe: Timeframe,
    ) -> AppResult<SubscriptionAnalytics> {
        let scoped = Self::filter_for_actor(self.store.all().await?, actor);
        let since = now_millis() - timeframe.days() * DAY_MS;
        Ok(analytics::compute(&scoped, since, timeframe))
    }
}

fn to_recurring_item(input: &RecurringItemInput) -> RecurringItem {
    RecurringItem {
        crop_id: input.crop_id,
        quantity: input.quantity,
        max_price_per_unit: input.max_price_per_unit,
        substitution_allowed: input.substitution_allowed,
        acceptable_substitutes: input.acceptable_substitutes.clone(),
        seasonal: input.seasonal.clone(),
        special_instructions: input.special_instructions.clone(),
    }
}

fn check_party(subscription: &Subscription, actor: Actor) -> AppResult<()> {
    if !actor.is_party_or_admin(&[subscription.customer_id, subscription.farmer_id]) {
        return Err(AppError::permission_denied("Access denied"));
    }
    Ok(())
}

fn validate_address_fields(address: &Address) -> AppResult<()> {
    validate_required_text(&address.street, "street", validation::MAX_ADDRESS_LEN)?;
    validate_required_text(&address.city, "city", validation::MAX_NAME_LEN)?;
    validate_required_text(&address.state, "state", validation::MAX_NAME_LEN)?;
    validate_required_text(&address.zip_code, "zip_code", validation::MAX_SHORT_TEXT_LEN)?;
    Ok(())
}

fn validate_pricing(pricing: &Pricing) -> AppResult<()> {
    money::validate_amount(pricing.base_delivery_fee, "base_delivery_fee")?;
    if !(0.0..=100.0).contains(&pricing.discount_percentage) {
        return Err(AppError::validation(format!(
            "discount_percentage must be between 0 and 100, got {}",
            pricing.discount_percentage
        )));
    }
    if !(0.0..=50.0).contains(&pricing.loyalty_discount) {
        return Err(AppError::validation(format!(
            "loyalty_discount must be between 0 and 50, got {}",
            pricing.loyalty_discount
        )));
    }
    Ok(())
}
