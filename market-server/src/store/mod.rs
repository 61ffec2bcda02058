//! Keyed aggregate store seam
//!
//! Persistent storage mechanics live outside the core; the engine only
//! depends on an abstract keyed read/create/update store per aggregate
//! type, plus the handful of range queries the read side needs.
//!
//! Orders and subscriptions are independent top-level aggregates: deleting
//! one never cascades into the other.

mod memory;

pub use memory::{MemoryOrderStore, MemorySubscriptionStore};

use async_trait::async_trait;
use shared::AppResult;
use shared::models::{Order, OrderStatus, Subscription};
use shared::types::UserId;

/// Order aggregate store
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Create a new order; fails if the identifier already exists
    async fn insert(&self, order: Order) -> AppResult<()>;

    /// Read an order by identifier
    async fn get(&self, order_id: &str) -> AppResult<Option<Order>>;

    /// Replace a previously created order; fails if missing
    async fn update(&self, order: Order) -> AppResult<()>;

    /// Look up an order by logistics tracking number
    async fn find_by_tracking_number(&self, tracking_number: &str) -> AppResult<Option<Order>>;

    /// Orders with the given status whose delivery window starts inside
    /// `[start, end)`, ascending by window start
    async fn for_delivery_window(
        &self,
        start: i64,
        end: i64,
        status: OrderStatus,
    ) -> AppResult<Vec<Order>>;

    /// All orders where the given user is the buyer, newest first
    async fn by_buyer(&self, buyer_id: UserId) -> AppResult<Vec<Order>>;

    /// All orders where the given user is the farmer, newest first
    async fn by_farmer(&self, farmer_id: UserId) -> AppResult<Vec<Order>>;
}

/// Subscription aggregate store
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Create a new subscription; fails if the identifier already exists
    async fn insert(&self, subscription: Subscription) -> AppResult<()>;

    /// Read a subscription by identifier
    async fn get(&self, subscription_id: &str) -> AppResult<Option<Subscription>>;

    /// Replace a previously created subscription; fails if missing
    async fn update(&self, subscription: Subscription) -> AppResult<()>;

    /// Active subscriptions with `next_delivery_date <= cutoff`,
    /// ascending by next delivery date
    async fn due(&self, cutoff: i64) -> AppResult<Vec<Subscription>>;

    /// Active subscriptions with `next_delivery_date` in `[start, end]`,
    /// ascending by next delivery date
    async fn upcoming(&self, start: i64, end: i64) -> AppResult<Vec<Subscription>>;

    /// Every stored subscription (analytics scans filter from here)
    async fn all(&self) -> AppResult<Vec<Subscription>>;
}
