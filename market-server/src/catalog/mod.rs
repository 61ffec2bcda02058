//! Crop catalog seam
//!
//! The catalog is an external collaborator: the engine only asks for the
//! current listed price and availability of a crop reference when it
//! realizes a subscription delivery.

use async_trait::async_trait;
use dashmap::DashMap;
use shared::models::CropQuote;
use shared::types::CropId;
use shared::{AppError, AppResult, ErrorCode};

/// Live price and availability lookup by crop reference
#[async_trait]
pub trait CropCatalog: Send + Sync {
    /// Quote the current listing for a crop
    ///
    /// Fails with `CropNotFound` when the reference is unresolvable.
    async fn quote(&self, crop_id: CropId) -> AppResult<CropQuote>;
}

/// In-memory catalog, used by tests and the demo wiring
#[derive(Default)]
pub struct MemoryCatalog {
    listings: DashMap<CropId, CropQuote>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a listing
    pub fn put(&self, quote: CropQuote) {
        self.listings.insert(quote.crop_id, quote);
    }

    /// Update just the listed price of an existing listing
    pub fn set_price(&self, crop_id: CropId, price: f64) {
        if let Some(mut entry) = self.listings.get_mut(&crop_id) {
            entry.price = price;
        }
    }
}

#[async_trait]
impl CropCatalog for MemoryCatalog {
    async fn quote(&self, crop_id: CropId) -> AppResult<CropQuote> {
        self.listings
            .get(&crop_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::CropNotFound,
                    format!("Crop listing {} not found", crop_id),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_quote_roundtrip() {
        let catalog = MemoryCatalog::new();
        catalog.put(CropQuote {
            crop_id: 1,
            name: "Kale".to_string(),
            category: Some("greens".to_string()),
            price: 2.75,
            available: true,
        });

        let quote = catalog.quote(1).await.unwrap();
        assert_eq!(quote.name, "Kale");
        assert_eq!(quote.price, 2.75);

        catalog.set_price(1, 3.10);
        assert_eq!(catalog.quote(1).await.unwrap().price, 3.10);
    }

    #[tokio::test]
    async fn test_unknown_crop() {
        let catalog = MemoryCatalog::new();
        let err = catalog.quote(42).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CropNotFound);
    }
}
