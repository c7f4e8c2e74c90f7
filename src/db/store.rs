use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use tracing::debug;

use super::services;
use crate::monitoring::models::{CycleAuditRecord, Listing};
use crate::monitoring::store::{ListingStore, StoreError};

/// `ListingStore` over a sea-orm connection.
#[derive(Clone)]
pub struct DbListingStore {
    db: DatabaseConnection,
}

impl DbListingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn map_update_err(listing_id: i32, err: DbErr) -> StoreError {
    match err {
        DbErr::RecordNotUpdated | DbErr::RecordNotFound(_) => {
            StoreError::ListingNotFound(listing_id)
        }
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl ListingStore for DbListingStore {
    async fn load_active_and_sold_listings(&self) -> Result<Vec<Listing>, StoreError> {
        let models = services::get_active_and_sold_listings(&self.db).await?;
        Ok(models.into_iter().map(Listing::from).collect())
    }

    async fn load_unnotified_expired_listings(&self) -> Result<Vec<Listing>, StoreError> {
        let models = services::get_unnotified_expired_listings(&self.db).await?;
        Ok(models.into_iter().map(Listing::from).collect())
    }

    async fn save_listing(&self, listing: &Listing) -> Result<(), StoreError> {
        services::update_listing_state(&self.db, listing)
            .await
            .map_err(|e| map_update_err(listing.id, e))?;
        Ok(())
    }

    async fn append_audit_record(&self, record: &CycleAuditRecord) -> Result<(), StoreError> {
        services::append_audit_record(&self.db, record).await?;
        Ok(())
    }

    /// All listing updates and the audit record land in one transaction.
    async fn commit_cycle(
        &self,
        listings: &[Listing],
        record: &CycleAuditRecord,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;
        for listing in listings {
            services::update_listing_state(&txn, listing)
                .await
                .map_err(|e| map_update_err(listing.id, e))?;
        }
        services::append_audit_record(&txn, record).await?;
        txn.commit().await?;

        debug!(updated = listings.len(), "Cycle results committed.");
        Ok(())
    }
}
