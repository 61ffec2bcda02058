//! Subscription aggregate (recurring order template)
//!
//! A subscription turns a standing arrangement into periodic concrete
//! deliveries. It owns its pause/resume accounting, delivery history, and
//! running metrics. The `next_delivery_date` cursor is the single mutable
//! scheduling field; the temporal arithmetic that advances it lives in the
//! engine crate.

use super::order::Address;
use crate::types::{CropId, Timestamp, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Delivery cadence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Custom,
}

/// Subscription lifecycle status — single source of truth, never inferred
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Paused,
    Cancelled,
    Expired,
}

/// Preferred delivery day of week
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Preferred delivery time bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    #[default]
    Anytime,
}

/// Seasonal quantity bounds for an item template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SeasonalBounds {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<i32>,
}

/// Recurring item template
///
/// `max_price_per_unit` is a ceiling to validate against, not the charged
/// price — the live catalog price is charged at delivery realization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringItem {
    pub crop_id: CropId,
    pub quantity: i32,
    pub max_price_per_unit: f64,
    #[serde(default)]
    pub substitution_allowed: bool,
    #[serde(default)]
    pub acceptable_substitutes: Vec<CropId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasonal: Option<SeasonalBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// Delivery scheduling preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeliveryPreferences {
    #[serde(default)]
    pub preferred_days: Vec<DayOfWeek>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<TimeOfDay>,
    /// Calendar days on which no delivery may land (holidays, vacations)
    #[serde(default)]
    pub avoid_dates: Vec<NaiveDate>,
}

/// Budget ceilings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Budget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_per_delivery: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_per_month: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Pricing applied at delivery realization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Pricing {
    #[serde(default)]
    pub base_delivery_fee: f64,
    /// Percentage (0-100)
    #[serde(default)]
    pub discount_percentage: f64,
    /// Percentage (0-50)
    #[serde(default)]
    pub loyalty_discount: f64,
}

/// Flexible delivery options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flexibility {
    #[serde(default = "default_true")]
    pub allow_quantity_adjustment: bool,
    #[serde(default)]
    pub allow_price_adjustment: bool,
    #[serde(default)]
    pub allow_item_substitution: bool,
    #[serde(default = "default_true")]
    pub allow_date_shifting: bool,
    #[serde(default = "default_shift_days")]
    pub max_date_shift_days: i32,
}

impl Default for Flexibility {
    fn default() -> Self {
        Self {
            allow_quantity_adjustment: true,
            allow_price_adjustment: false,
            allow_item_substitution: false,
            allow_date_shifting: true,
            max_date_shift_days: 3,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_shift_days() -> i32 {
    3
}

/// Upcoming-delivery reminder preference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderPref {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reminder_days")]
    pub days_before: i64,
}

impl Default for ReminderPref {
    fn default() -> Self {
        Self {
            enabled: true,
            days_before: 1,
        }
    }
}

fn default_reminder_days() -> i64 {
    1
}

/// Price-change notification preference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceChangePref {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Percentage threshold
    #[serde(default = "default_price_threshold")]
    pub threshold: f64,
}

impl Default for PriceChangePref {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 10.0,
        }
    }
}

fn default_price_threshold() -> f64 {
    10.0
}

/// On/off notification preference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TogglePref {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TogglePref {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Notification preferences for a subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationPrefs {
    #[serde(default)]
    pub upcoming_delivery: ReminderPref,
    #[serde(default)]
    pub price_changes: PriceChangePref,
    #[serde(default)]
    pub item_unavailable: TogglePref,
    #[serde(default)]
    pub delivery_confirmation: TogglePref,
}

/// Item snapshot inside a delivery record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveredItem {
    pub crop_id: CropId,
    pub quantity: i32,
    pub price: f64,
}

/// Customer satisfaction attached to a realized delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SatisfactionRating {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub timestamp: Timestamp,
}

/// One realized delivery (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryRecord {
    pub order_id: String,
    pub delivered_date: Timestamp,
    pub total_amount: f64,
    pub items_delivered: Vec<DeliveredItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfaction: Option<SatisfactionRating>,
}

/// One pause interval (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PauseRecord {
    pub paused_date: Timestamp,
    /// Null until the subscription is resumed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub paused_by: UserId,
}

/// Cancellation record — null until cancelled, then frozen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationDetails {
    pub cancelled_date: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub cancelled_by: UserId,
    pub refund_amount: f64,
    pub feedback_provided: bool,
}

/// Running subscription metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SubscriptionMetrics {
    pub total_orders: u32,
    pub total_spent: f64,
    /// Derived: total_spent / total_orders, recomputed on every delivery
    pub average_order_value: f64,
    /// Derived: sparse mean over rated deliveries, recomputed on every rating
    pub satisfaction_score: f64,
    pub missed_deliveries: u32,
    /// Accumulated whole days spent paused, never decreased
    pub paused_days: i64,
}

/// Subscription aggregate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    /// Opaque unique subscription identifier, immutable once set
    pub subscription_id: String,
    pub customer_id: UserId,
    pub farmer_id: UserId,

    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub items: Vec<RecurringItem>,

    pub frequency: Frequency,
    /// Day count, only meaningful when frequency is custom
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_frequency_days: Option<u32>,

    pub delivery_address: Address,
    #[serde(default)]
    pub delivery_window: DeliveryPreferences,

    #[serde(default)]
    pub status: SubscriptionStatus,

    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub pricing: Pricing,

    pub start_date: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Timestamp>,
    /// The single mutable scheduling cursor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_delivery_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_delivery_date: Option<Timestamp>,

    /// Append-only history of realized deliveries
    #[serde(default)]
    pub delivery_history: Vec<DeliveryRecord>,

    #[serde(default)]
    pub flexibility: Flexibility,
    #[serde(default)]
    pub notifications: NotificationPrefs,

    #[serde(default)]
    pub metrics: SubscriptionMetrics,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_notes: Option<String>,

    /// Append-only pause intervals
    #[serde(default)]
    pub pause_history: Vec<PauseRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_details: Option<CancellationDetails>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Open a pause interval and move to paused
    ///
    /// The caller is responsible for the active-status precondition.
    pub fn record_pause(&mut self, reason: Option<String>, paused_by: UserId, now: Timestamp) {
        self.status = SubscriptionStatus::Paused;
        self.pause_history.push(PauseRecord {
            paused_date: now,
            resumed_date: None,
            reason,
            paused_by,
        });
        self.updated_at = now;
    }

    /// Close the most recent open pause interval and move back to active.
    ///
    /// Returns the whole days (ceiling) added to `metrics.paused_days`.
    /// Paused time is not credited toward the cadence; the caller advances
    /// the cursor forward from wherever it was.
    pub fn close_pause(&mut self, now: Timestamp) -> i64 {
        self.status = SubscriptionStatus::Active;
        self.updated_at = now;

        let Some(open) = self
            .pause_history
            .iter_mut()
            .rev()
            .find(|p| p.resumed_date.is_none())
        else {
            return 0;
        };
        open.resumed_date = Some(now);

        let elapsed = (now - open.paused_date).max(0);
        // `i64::div_ceil` is still unstable (issue #88581); elapsed >= 0 and
        // DAY_MS > 0 here, so this is the exact ceil-division equivalent.
        let days = (elapsed + DAY_MS - 1) / DAY_MS;
        self.metrics.paused_days += days;
        days
    }

    /// Write the cancellation record and move to cancelled.
    ///
    /// The caller is responsible for the not-already-cancelled precondition
    /// (a second successful cancel would clobber refund bookkeeping).
    pub fn record_cancellation(
        &mut self,
        reason: Option<String>,
        cancelled_by: UserId,
        refund_amount: f64,
        now: Timestamp,
    ) {
        self.status = SubscriptionStatus::Cancelled;
        self.cancellation_details = Some(CancellationDetails {
            cancelled_date: now,
            reason,
            cancelled_by,
            refund_amount,
            feedback_provided: false,
        });
        self.updated_at = now;
    }

    /// Append a realized delivery and update the running metrics.
    ///
    /// `average_order_value` is recomputed from the totals, not incremented.
    pub fn record_delivery(
        &mut self,
        order_id: String,
        items_delivered: Vec<DeliveredItem>,
        total_amount: f64,
        now: Timestamp,
    ) {
        self.delivery_history.push(DeliveryRecord {
            order_id,
            delivered_date: now,
            total_amount,
            items_delivered,
            satisfaction: None,
        });

        self.metrics.total_orders += 1;
        self.metrics.total_spent += total_amount;
        self.metrics.average_order_value =
            self.metrics.total_spent / self.metrics.total_orders as f64;
        self.last_delivery_date = Some(now);
        self.updated_at = now;
    }

    /// Attach a satisfaction rating to the most recent delivery and
    /// recompute the satisfaction score.
    ///
    /// Only the latest delivery is rateable through this path. Returns
    /// false when there is no delivery to rate.
    pub fn rate_latest_delivery(
        &mut self,
        rating: u8,
        feedback: Option<String>,
        now: Timestamp,
    ) -> bool {
        let Some(last) = self.delivery_history.last_mut() else {
            return false;
        };
        last.satisfaction = Some(SatisfactionRating {
            rating,
            feedback,
            timestamp: now,
        });
        self.recompute_satisfaction();
        self.updated_at = now;
        true
    }

    /// Sparse arithmetic mean over all rated deliveries — a full rescan,
    /// not a running average. Entries without a rating are excluded from
    /// both numerator and denominator.
    fn recompute_satisfaction(&mut self) {
        let rated: Vec<u8> = self
            .delivery_history
            .iter()
            .filter_map(|d| d.satisfaction.as_ref().map(|s| s.rating))
            .collect();
        self.metrics.satisfaction_score = if rated.is_empty() {
            0.0
        } else {
            rated.iter().map(|r| *r as f64).sum::<f64>() / rated.len() as f64
        };
    }
}
