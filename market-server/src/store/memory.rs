//! DashMap-backed in-memory store implementations
//!
//! Used by tests and the demo wiring. A deployment swaps these for a
//! persistent implementation behind the same traits.

use super::{OrderStore, SubscriptionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use shared::models::{Order, OrderStatus, Subscription, SubscriptionStatus};
use shared::types::UserId;
use shared::{AppError, AppResult};

/// In-memory order store
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<String, Order>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: Order) -> AppResult<()> {
        if self.orders.contains_key(&order.order_id) {
            return Err(AppError::already_exists(format!("Order {}", order.order_id)));
        }
        self.orders.insert(order.order_id.clone(), order);
        Ok(())
    }

    async fn get(&self, order_id: &str) -> AppResult<Option<Order>> {
        Ok(self.orders.get(order_id).map(|entry| entry.clone()))
    }

    async fn update(&self, order: Order) -> AppResult<()> {
        if !self.orders.contains_key(&order.order_id) {
            return Err(AppError::storage(format!(
                "Order {} missing on update",
                order.order_id
            )));
        }
        self.orders.insert(order.order_id.clone(), order);
        Ok(())
    }

    async fn find_by_tracking_number(&self, tracking_number: &str) -> AppResult<Option<Order>> {
        Ok(self
            .orders
            .iter()
            .find(|entry| {
                entry
                    .logistics
                    .as_ref()
                    .and_then(|l| l.tracking_number.as_deref())
                    == Some(tracking_number)
            })
            .map(|entry| entry.clone()))
    }

    async fn for_delivery_window(
        &self,
        start: i64,
        end: i64,
        status: OrderStatus,
    ) -> AppResult<Vec<Order>> {
        let mut matches: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.current_status == status)
            .filter(|entry| {
                entry
                    .delivery_window
                    .as_ref()
                    .and_then(|w| w.start_time)
                    .is_some_and(|t| t >= start && t < end)
            })
            .map(|entry| entry.clone())
            .collect();
        matches.sort_by_key(|o| o.delivery_window.as_ref().and_then(|w| w.start_time));
        Ok(matches)
    }

    async fn by_buyer(&self, buyer_id: UserId) -> AppResult<Vec<Order>> {
        let mut matches: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.buyer_id == buyer_id)
            .map(|entry| entry.clone())
            .collect();
        matches.sort_by_key(|o| std::cmp::Reverse(o.order_date));
        Ok(matches)
    }

    async fn by_farmer(&self, farmer_id: UserId) -> AppResult<Vec<Order>> {
        let mut matches: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.farmer_id == farmer_id)
            .map(|entry| entry.clone())
            .collect();
        matches.sort_by_key(|o| std::cmp::Reverse(o.order_date));
        Ok(matches)
    }
}

/// In-memory subscription store
#[derive(Default)]
pub struct MemorySubscriptionStore {
    subscriptions: DashMap<String, Subscription>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn insert(&self, subscription: Subscription) -> AppResult<()> {
        if self.subscriptions.contains_key(&subscription.subscription_id) {
            return Err(AppError::already_exists(format!(
                "Subscription {}",
                subscription.subscription_id
            )));
        }
        self.subscriptions
            .insert(subscription.subscription_id.clone(), subscription);
        Ok(())
    }

    async fn get(&self, subscription_id: &str) -> AppResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .get(subscription_id)
            .map(|entry| entry.clone()))
    }

    async fn update(&self, subscription: Subscription) -> AppResult<()> {
        if !self
            .subscriptions
            .contains_key(&subscription.subscription_id)
        {
            return Err(AppError::storage(format!(
                "Subscription {} missing on update",
                subscription.subscription_id
            )));
        }
        self.subscriptions
            .insert(subscription.subscription_id.clone(), subscription);
        Ok(())
    }

    async fn due(&self, cutoff: i64) -> AppResult<Vec<Subscription>> {
        let mut matches: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.status == SubscriptionStatus::Active)
            .filter(|entry| entry.next_delivery_date.is_some_and(|next| next <= cutoff))
            .map(|entry| entry.clone())
            .collect();
        matches.sort_by_key(|s| s.next_delivery_date);
        Ok(matches)
    }

    async fn upcoming(&self, start: i64, end: i64) -> AppResult<Vec<Subscription>> {
        let mut matches: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.status == SubscriptionStatus::Active)
            .filter(|entry| {
                entry
                    .next_delivery_date
                    .is_some_and(|next| next >= start && next <= end)
            })
            .map(|entry| entry.clone())
            .collect();
        matches.sort_by_key(|s| s.next_delivery_date);
        Ok(matches)
    }

    async fn all(&self) -> AppResult<Vec<Subscription>> {
        Ok(self.subscriptions.iter().map(|entry| entry.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{Address, DeliveryMethod, OrderSource, SubscriptionStatus};

    fn address() -> Address {
        Address {
            street: "1 Farm Rd".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip_code: "62701".to_string(),
            country: "USA".to_string(),
            coordinates: None,
            delivery_instructions: None,
            contact_phone: None,
        }
    }

    fn order(id: &str) -> Order {
        Order {
            order_id: id.to_string(),
            buyer_id: 10,
            farmer_id: 20,
            items: Vec::new(),
            subtotal: 0.0,
            delivery_fee: 0.0,
            tax: 0.0,
            discount: 0.0,
            total_amount: 0.0,
            delivery_address: address(),
            pickup_address: None,
            delivery_method: DeliveryMethod::HomeDelivery,
            delivery_window: None,
            tracking: Vec::new(),
            current_status: OrderStatus::Pending,
            logistics: None,
            quality_rating: None,
            notifications: Vec::new(),
            order_date: 0,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            order_source: OrderSource::Web,
            is_recurring: false,
            subscription_id: None,
            special_requests: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn subscription(id: &str, next: Option<i64>) -> Subscription {
        Subscription {
            subscription_id: id.to_string(),
            customer_id: 10,
            farmer_id: 20,
            title: "Box".to_string(),
            description: None,
            items: Vec::new(),
            frequency: shared::models::Frequency::Weekly,
            custom_frequency_days: None,
            delivery_address: address(),
            delivery_window: Default::default(),
            status: SubscriptionStatus::Active,
            budget: Default::default(),
            pricing: Default::default(),
            start_date: 0,
            end_date: None,
            next_delivery_date: next,
            last_delivery_date: None,
            delivery_history: Vec::new(),
            flexibility: Default::default(),
            notifications: Default::default(),
            metrics: Default::default(),
            customer_notes: None,
            farmer_notes: None,
            pause_history: Vec::new(),
            cancellation_details: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = MemoryOrderStore::new();
        store.insert(order("FM-1")).await.unwrap();
        assert!(store.insert(order("FM-1")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_requires_existing() {
        let store = MemoryOrderStore::new();
        assert!(store.update(order("FM-404")).await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_tracking_number() {
        let store = MemoryOrderStore::new();
        let mut tracked = order("FM-1");
        tracked.logistics = Some(shared::models::LogisticsInfo {
            tracking_number: Some("TN-77".to_string()),
            ..Default::default()
        });
        store.insert(tracked).await.unwrap();
        store.insert(order("FM-2")).await.unwrap();

        let found = store.find_by_tracking_number("TN-77").await.unwrap();
        assert_eq!(found.unwrap().order_id, "FM-1");
        assert!(store.find_by_tracking_number("TN-0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_filters_and_sorts() {
        let store = MemorySubscriptionStore::new();
        store.insert(subscription("SUB-A", Some(500))).await.unwrap();
        store.insert(subscription("SUB-B", Some(100))).await.unwrap();
        store.insert(subscription("SUB-C", Some(9_999))).await.unwrap();
        let mut paused = subscription("SUB-D", Some(50));
        paused.status = SubscriptionStatus::Paused;
        store.insert(paused).await.unwrap();
        store.insert(subscription("SUB-E", None)).await.unwrap();

        let due = store.due(1_000).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|s| s.subscription_id.as_str()).collect();
        assert_eq!(ids, vec!["SUB-B", "SUB-A"]);
    }

    #[tokio::test]
    async fn test_upcoming_window_inclusive() {
        let store = MemorySubscriptionStore::new();
        store.insert(subscription("SUB-A", Some(100))).await.unwrap();
        store.insert(subscription("SUB-B", Some(200))).await.unwrap();
        store.insert(subscription("SUB-C", Some(300))).await.unwrap();

        let upcoming = store.upcoming(100, 200).await.unwrap();
        let ids: Vec<&str> = upcoming.iter().map(|s| s.subscription_id.as_str()).collect();
        assert_eq!(ids, vec!["SUB-A", "SUB-B"]);
    }
}
