//! Upcoming-delivery reminder worker
//!
//! Periodic background task: scans active subscriptions whose next
//! delivery falls within their reminder window and emits an
//! upcoming-delivery notification to the customer, once per
//! (subscription, delivery day).

use crate::notify::{NotificationSink, OutboundNotification};
use crate::store::SubscriptionStore;
use crate::utils::time;
use crate::utils::AppResult;
use chrono::NaiveDate;
use chrono_tz::Tz;
use shared::models::NotificationChannel;
use shared::util::now_millis;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Widest reminder window served; per-subscription `days_before` narrows it
const MAX_LOOKAHEAD_DAYS: i64 = 14;

/// Upcoming-delivery reminder scheduler
pub struct ReminderWorker {
    store: Arc<dyn SubscriptionStore>,
    sink: Arc<dyn NotificationSink>,
    shutdown: CancellationToken,
    tz: Tz,
    interval: Duration,
    /// Dedup per (subscription, delivery day)
    sent: parking_lot::Mutex<HashSet<(String, NaiveDate)>>,
}

impl ReminderWorker {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        sink: Arc<dyn NotificationSink>,
        shutdown: CancellationToken,
        tz: Tz,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            shutdown,
            tz,
            interval,
            sent: parking_lot::Mutex::new(HashSet::new()),
        }
    }

    /// Main loop: scan on every tick until shutdown
    pub async fn run(self) {
        tracing::info!("Reminder worker started");

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.scan().await {
                        Ok(sent) if sent > 0 => {
                            tracing::debug!(sent, "Reminder scan completed");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Reminder scan failed"),
                    }
                }
            }
        }

        tracing::info!("Reminder worker stopped");
    }

    /// One scan pass; returns the number of reminders sent
    pub async fn scan(&self) -> AppResult<usize> {
        let now = now_millis();
        let horizon = now + MAX_LOOKAHEAD_DAYS * DAY_MS;
        let due_soon = self.store.upcoming(now, horizon).await?;

        let mut sent_count = 0;
        for subscription in due_soon {
            let pref = &subscription.notifications.upcoming_delivery;
            if !pref.enabled {
                continue;
            }
            let Some(next) = subscription.next_delivery_date else {
                continue;
            };
            if next > now + pref.days_before * DAY_MS {
                continue;
            }

            let delivery_day = time::local_date(next, self.tz);
            let key = (subscription.subscription_id.clone(), delivery_day);
            if !self.sent.lock().insert(key) {
                continue;
            }

            let message = format!(
                "Your subscription \"{}\" has a delivery scheduled for {}.",
                subscription.title, delivery_day
            );
            let outbound = OutboundNotification::new(
                subscription.customer_id,
                NotificationChannel::InApp,
                message,
                now,
            );
            if let Err(e) = self.sink.deliver(outbound).await {
                tracing::warn!(
                    subscription_id = %subscription.subscription_id,
                    error = %e,
                    "Reminder delivery failed"
                );
            } else {
                sent_count += 1;
            }
        }

        Ok(sent_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::CollectingSink;
    use crate::store::{MemorySubscriptionStore, SubscriptionStore};
    use shared::models::{
        Address, DeliveryPreferences, Frequency, NotificationPrefs, Subscription,
        SubscriptionStatus,
    };

    fn subscription(id: &str, next: Option<i64>, reminders_enabled: bool) -> Subscription {
        let mut prefs = NotificationPrefs::default();
        prefs.upcoming_delivery.enabled = reminders_enabled;
        prefs.upcoming_delivery.days_before = 1;
        Subscription {
            subscription_id: id.to_string(),
            customer_id: 10,
            farmer_id: 20,
            title: "Weekly veg box".to_string(),
            description: None,
            items: Vec::new(),
            frequency: Frequency::Weekly,
            custom_frequency_days: None,
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
            delivery_window: DeliveryPreferences::default(),
            status: SubscriptionStatus::Active,
            budget: Default::default(),
            pricing: Default::default(),
            start_date: 0,
            end_date: None,
            next_delivery_date: next,
            last_delivery_date: None,
            delivery_history: Vec::new(),
            flexibility: Default::default(),
            notifications: prefs,
            metrics: Default::default(),
            customer_notes: None,
            farmer_notes: None,
            pause_history: Vec::new(),
            cancellation_details: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn worker(
        store: Arc<MemorySubscriptionStore>,
        sink: Arc<CollectingSink>,
    ) -> ReminderWorker {
        ReminderWorker::new(
            store,
            sink,
            CancellationToken::new(),
            chrono_tz::UTC,
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_scan_sends_and_deduplicates() {
        let store = Arc::new(MemorySubscriptionStore::new());
        let sink = Arc::new(CollectingSink::new());
        let soon = now_millis() + 6 * 60 * 60 * 1000; // 6 hours out
        store
            .insert(subscription("SUB-A", Some(soon), true))
            .await
            .unwrap();

        let worker = worker(store, sink.clone());
        assert_eq!(worker.scan().await.unwrap(), 1);
        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].message.contains("Weekly veg box"));

        // second pass for the same delivery day sends nothing
        assert_eq!(worker.scan().await.unwrap(), 0);
        assert_eq!(sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_respects_disabled_preference() {
        let store = Arc::new(MemorySubscriptionStore::new());
        let sink = Arc::new(CollectingSink::new());
        let soon = now_millis() + 6 * 60 * 60 * 1000;
        store
            .insert(subscription("SUB-A", Some(soon), false))
            .await
            .unwrap();

        let worker = worker(store, sink.clone());
        assert_eq!(worker.scan().await.unwrap(), 0);
        assert!(sink.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_scan_skips_deliveries_outside_reminder_window() {
        let store = Arc::new(MemorySubscriptionStore::new());
        let sink = Arc::new(CollectingSink::new());
        // 3 days out, but days_before is 1
        let later = now_millis() + 3 * DAY_MS;
        store
            .insert(subscription("SUB-A", Some(later), true))
            .await
            .unwrap();

        let worker = worker(store, sink.clone());
        assert_eq!(worker.scan().await.unwrap(), 0);
        assert!(sink.delivered().is_empty());
    }
}
