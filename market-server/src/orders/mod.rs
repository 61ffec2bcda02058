//! Order tracking module
//!
//! Implements the order-tracking state machine over the storage seam:
//!
//! - **manager**: OrdersManager — create, tracking updates, cancel, rate,
//!   estimate, lookup queries
//! - **money**: precise decimal arithmetic for monetary fields
//!
//! # State machine
//!
//! ```text
//! pending → confirmed → preparing → packed → shipped → out_for_delivery → delivered
//!     └────────┴───────────┘ (cancellable)        cancelled / returned from any
//!                                                 non-terminal state
//! ```
//!
//! `current_status` is derived from the tracking log tail; lifecycle
//! timestamps are stamped write-once on first entry into the matching
//! status.

pub mod manager;
pub mod money;

pub use manager::{
    CreateOrderInput, OrderItemInput, OrdersManager, RecurringOrderSpec, TrackingUpdateInput,
};
