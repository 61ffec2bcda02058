//! Marketplace engine for produce growers and buyers
//!
//! This crate owns the two stateful cores of the marketplace:
//!
//! - **orders**: the order-tracking state machine (append-only tracking
//!   log, derived current status, write-once lifecycle timestamps)
//! - **subscriptions**: the recurring-delivery engine (temporal scheduler,
//!   pause/resume accounting, delivery realization, due/upcoming queries)
//!
//! Everything else is a seam to an external collaborator: a keyed
//! aggregate store, a crop catalog lookup, and a fire-and-forget
//! notification sink.
//!
//! # Architecture
//!
//! ```text
//! Route layer (external)
//!      │
//!      ▼
//! OrdersManager ──────────┐
//! SubscriptionsManager ───┤──► AggregateStore (keyed read/modify/write)
//!      │                  │──► CropCatalog   (live price + availability)
//!      ▼                  └──► NotificationSink (fire-and-forget)
//! scheduler (pure date arithmetic)
//! ```
//!
//! Mutations on one aggregate are serialized through a per-aggregate lock;
//! mutations on distinct aggregates proceed in parallel.

pub mod catalog;
pub mod core;
pub mod notify;
pub mod orders;
pub mod store;
pub mod subscriptions;
pub mod utils;

// Re-exports
pub use self::core::config::Config;
pub use orders::OrdersManager;
pub use subscriptions::{ReminderWorker, SubscriptionsManager};
