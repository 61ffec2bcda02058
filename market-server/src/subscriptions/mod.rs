//! Subscription engine module
//!
//! Implements the recurring-delivery engine:
//!
//! - **scheduler**: pure date arithmetic for the next-occurrence cursor
//! - **manager**: SubscriptionsManager — lifecycle, delivery realization,
//!   satisfaction scoring, due/upcoming queries
//! - **analytics**: per-status aggregation over a timeframe
//! - **reminder**: periodic upcoming-delivery reminder worker
//!
//! # Lifecycle
//!
//! ```text
//! active ⇄ paused
//! active | paused → cancelled (terminal)
//! expired: declared, no transition wired (see DESIGN.md)
//! ```

pub mod analytics;
pub mod manager;
pub mod reminder;
pub mod scheduler;

pub use analytics::{SubscriptionAnalytics, Timeframe};
pub use manager::{
    CreateSubscriptionInput, RecurringItemInput, SubscriptionsManager, UpdateSubscriptionInput,
};
pub use reminder::ReminderWorker;
