//! Crop catalog quote
//!
//! The catalog itself is an external collaborator; the engine only needs
//! the current listed price and availability for a crop reference.

use crate::types::CropId;
use serde::{Deserialize, Serialize};

/// Current listing data for a crop reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropQuote {
    pub crop_id: CropId,
    /// Name snapshot, copied into order lines at realization time
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Current listed price per unit
    pub price: f64,
    pub available: bool,
}
