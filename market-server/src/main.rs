use market_server::catalog::MemoryCatalog;
use market_server::notify::BroadcastSink;
use market_server::store::{MemoryOrderStore, MemorySubscriptionStore};
use market_server::utils::logger;
use market_server::{Config, OrdersManager, ReminderWorker, SubscriptionsManager};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, config, logging)
    dotenv::dotenv().ok();
    let config = Config::from_env();
    logger::init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    tracing::info!(tz = %config.business_tz, "Market server starting...");

    // 2. Collaborator seams: in-memory store/catalog, broadcast notifier
    let order_store = Arc::new(MemoryOrderStore::new());
    let subscription_store = Arc::new(MemorySubscriptionStore::new());
    let catalog = Arc::new(MemoryCatalog::new());
    let sink = Arc::new(BroadcastSink::new());

    // Drain outbound notifications; a transport adapter replaces this
    let mut notifications = sink.subscribe();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            tracing::info!(
                recipient = notification.recipient,
                message = %notification.message,
                "Notification emitted"
            );
        }
    });

    // 3. Engine managers
    let orders = Arc::new(OrdersManager::new(
        order_store,
        sink.clone(),
        config.business_tz,
    ));
    let _subscriptions = Arc::new(SubscriptionsManager::new(
        subscription_store.clone(),
        catalog,
        orders,
        config.business_tz,
    ));

    // 4. Background tasks
    let shutdown = CancellationToken::new();
    let reminder = ReminderWorker::new(
        subscription_store,
        sink.clone(),
        shutdown.clone(),
        config.business_tz,
        Duration::from_secs(config.reminder_interval_secs),
    );
    let reminder_handle = tokio::spawn(reminder.run());

    tracing::info!("Market server ready");

    // 5. Run until interrupted
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
    let _ = reminder_handle.await;

    tracing::info!("Market server stopped");
    Ok(())
}
