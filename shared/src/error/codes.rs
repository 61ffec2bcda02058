//! Unified error codes for the marketplace core
//!
//! This module defines all error codes used across the engine and the
//! (external) route layer. Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Subscription errors
//! - 6xxx: Catalog errors
//! - 9xxx: System errors

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Operation invalid for the aggregate's current status
    StateConflict = 6,
    /// Aggregate configuration prevents the operation
    ConfigurationError = 7,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2002,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order can no longer be cancelled
    OrderNotCancellable = 4002,
    /// Order can only be rated once delivered
    OrderNotRateable = 4003,
    /// Order has no line items
    OrderEmpty = 4004,

    // ==================== 5xxx: Subscription ====================
    /// Subscription not found
    SubscriptionNotFound = 5001,
    /// Subscription is not active
    SubscriptionNotActive = 5002,
    /// Subscription is not paused
    SubscriptionNotPaused = 5003,
    /// Subscription has already been cancelled
    SubscriptionAlreadyCancelled = 5004,
    /// Avoid-date set prevents the schedule from converging
    ScheduleNotConvergent = 5005,
    /// Custom frequency requires a day count
    CustomFrequencyMissing = 5006,
    /// No delivery record to rate
    DeliveryNotFound = 5007,

    // ==================== 6xxx: Catalog ====================
    /// Crop listing not found
    CropNotFound = 6001,
    /// Crop listing is not available
    CropUnavailable = 6002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Storage error
    StorageError = 9002,
    /// Notification delivery failed
    NotificationFailed = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default human-readable message for this code
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::InvalidRequest => "Invalid request",
            Self::StateConflict => "Operation invalid for current status",
            Self::ConfigurationError => "Invalid configuration",

            Self::NotAuthenticated => "Authentication required",

            Self::PermissionDenied => "Permission denied",
            Self::AdminRequired => "Admin role required",

            Self::OrderNotFound => "Order not found",
            Self::OrderNotCancellable => "Order cannot be cancelled at this stage",
            Self::OrderNotRateable => "Can only rate delivered orders",
            Self::OrderEmpty => "Order has no items",

            Self::SubscriptionNotFound => "Subscription not found",
            Self::SubscriptionNotActive => "Subscription is not active",
            Self::SubscriptionNotPaused => "Subscription is not paused",
            Self::SubscriptionAlreadyCancelled => "Subscription is already cancelled",
            Self::ScheduleNotConvergent => "Avoid dates prevent schedule convergence",
            Self::CustomFrequencyMissing => "Custom frequency requires a day count",
            Self::DeliveryNotFound => "No delivery record found",

            Self::CropNotFound => "Crop listing not found",
            Self::CropUnavailable => "Crop listing is not available",

            Self::InternalError => "Internal server error",
            Self::StorageError => "Storage error",
            Self::NotificationFailed => "Notification delivery failed",
        }
    }

    /// Get the HTTP status code for this error code
    ///
    /// This is the seam consumed by the (external) route layer.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::ValidationFailed | Self::InvalidRequest | Self::OrderEmpty => {
                StatusCode::BAD_REQUEST
            }

            Self::NotFound
            | Self::OrderNotFound
            | Self::SubscriptionNotFound
            | Self::DeliveryNotFound
            | Self::CropNotFound => StatusCode::NOT_FOUND,

            Self::AlreadyExists
            | Self::StateConflict
            | Self::OrderNotCancellable
            | Self::OrderNotRateable
            | Self::SubscriptionNotActive
            | Self::SubscriptionNotPaused
            | Self::SubscriptionAlreadyCancelled => StatusCode::CONFLICT,

            Self::ConfigurationError
            | Self::ScheduleNotConvergent
            | Self::CustomFrequencyMissing
            | Self::CropUnavailable => StatusCode::UNPROCESSABLE_ENTITY,

            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,

            Self::PermissionDenied | Self::AdminRequired => StatusCode::FORBIDDEN,

            Self::Unknown | Self::InternalError | Self::StorageError | Self::NotificationFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 to an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::ValidationFailed,
            3 => Self::NotFound,
            4 => Self::AlreadyExists,
            5 => Self::InvalidRequest,
            6 => Self::StateConflict,
            7 => Self::ConfigurationError,
            1001 => Self::NotAuthenticated,
            2001 => Self::PermissionDenied,
            2002 => Self::AdminRequired,
            4001 => Self::OrderNotFound,
            4002 => Self::OrderNotCancellable,
            4003 => Self::OrderNotRateable,
            4004 => Self::OrderEmpty,
            5001 => Self::SubscriptionNotFound,
            5002 => Self::SubscriptionNotActive,
            5003 => Self::SubscriptionNotPaused,
            5004 => Self::SubscriptionAlreadyCancelled,
            5005 => Self::ScheduleNotConvergent,
            5006 => Self::CustomFrequencyMissing,
            5007 => Self::DeliveryNotFound,
            6001 => Self::CropNotFound,
            6002 => Self::CropUnavailable,
            9001 => Self::InternalError,
            9002 => Self::StorageError,
            9003 => Self::NotificationFailed,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}
