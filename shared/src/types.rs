//! Common types for the shared crate
//!
//! Identity and actor types used across the workspace.

use serde::{Deserialize, Serialize};

/// Timestamp type (Unix milliseconds)
pub type Timestamp = i64;

/// User identifier (snowflake-style)
pub type UserId = i64;

/// Crop listing identifier (snowflake-style)
pub type CropId = i64;

/// Role of an authenticated actor
///
/// Authentication and token verification happen outside the core; the
/// engine receives an already-verified actor and trusts it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Farmer,
    Admin,
}

/// An authenticated actor reference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this actor is one of the given parties (or an administrator)
    pub fn is_party_or_admin(&self, parties: &[UserId]) -> bool {
        self.is_admin() || parties.contains(&self.user_id)
    }
}
