//! Shared types for the marketplace core
//!
//! Domain models, identifier utilities, and the unified error system used
//! across the workspace crates.

pub mod error;
pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use types::{Actor, Role, Timestamp};
