use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

use super::models::{CycleAuditRecord, Listing};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Listing not found: {0}")]
    ListingNotFound(i32),
}

/// Persistence seen by the cycle engine. Implementations own every storage
/// detail; the engine only loads, saves and appends.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Active and sold listings, least recently checked first.
    async fn load_active_and_sold_listings(&self) -> Result<Vec<Listing>, StoreError>;

    /// Expired listings that still owe a notification: the expiry notice, or
    /// a sold notice held back past the deadline.
    async fn load_unnotified_expired_listings(&self) -> Result<Vec<Listing>, StoreError>;

    async fn save_listing(&self, listing: &Listing) -> Result<(), StoreError>;

    async fn append_audit_record(&self, record: &CycleAuditRecord) -> Result<(), StoreError>;

    /// Persists the outcome of one cycle. Implementations backed by a
    /// database should do this atomically.
    async fn commit_cycle(
        &self,
        listings: &[Listing],
        record: &CycleAuditRecord,
    ) -> Result<(), StoreError> {
        for listing in listings {
            self.save_listing(listing).await?;
        }
        self.append_audit_record(record).await
    }
}
