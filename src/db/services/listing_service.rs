use chrono::{NaiveDate, Utc};
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, DeleteResult, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::db::entities::{listing, prelude::Listing as ListingEntity};
use crate::db::enums::{ChannelKind, ListingStatus};
use crate::monitoring::models::Listing;

/// Input for registering a listing to monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub url: String,
    pub title: Option<String>,
    pub consignment_date: NaiveDate,
    pub channel: ChannelKind,
    pub recipient: String,
}

pub async fn create_listing<C: ConnectionTrait>(
    db: &C,
    new_listing: NewListing,
) -> Result<listing::Model, DbErr> {
    let now = Utc::now();
    let model = listing::ActiveModel {
        url: Set(new_listing.url),
        title: Set(new_listing.title),
        consignment_date: Set(new_listing.consignment_date),
        channel: Set(new_listing.channel),
        recipient: Set(new_listing.recipient),
        status: Set(ListingStatus::Active),
        sold_at: Set(None),
        consecutive_failures: Set(0),
        sold_notified: Set(false),
        deadline_warning_notified: Set(false),
        expired_notified: Set(false),
        last_weekly_digest_sent_on: Set(None),
        last_checked_at: Set(None),
        last_error: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    model.insert(db).await
}

/// All listings, optionally filtered by status, newest first.
pub async fn list_listings<C: ConnectionTrait>(
    db: &C,
    status: Option<ListingStatus>,
) -> Result<Vec<listing::Model>, DbErr> {
    let mut query = ListingEntity::find();
    if let Some(status) = status {
        query = query.filter(listing::Column::Status.eq(status));
    }
    query.order_by_desc(listing::Column::Id).all(db).await
}

pub async fn get_listing_by_id<C: ConnectionTrait>(
    db: &C,
    listing_id: i32,
) -> Result<Option<listing::Model>, DbErr> {
    ListingEntity::find_by_id(listing_id).one(db).await
}

pub async fn delete_listing<C: ConnectionTrait>(
    db: &C,
    listing_id: i32,
) -> Result<DeleteResult, DbErr> {
    ListingEntity::delete_by_id(listing_id).exec(db).await
}

/// Listings still subject to the cycle, least recently checked first.
/// SQLite sorts NULL first, so never-checked listings lead.
pub async fn get_active_and_sold_listings<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<listing::Model>, DbErr> {
    ListingEntity::find()
        .filter(listing::Column::Status.is_in([ListingStatus::Active, ListingStatus::Sold]))
        .order_by_asc(listing::Column::LastCheckedAt)
        .order_by_asc(listing::Column::Id)
        .all(db)
        .await
}

/// Expired listings that still owe their expiry notice, or a sold notice
/// that was held back until after the deadline.
pub async fn get_unnotified_expired_listings<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<listing::Model>, DbErr> {
    ListingEntity::find()
        .filter(listing::Column::Status.eq(ListingStatus::Expired))
        .filter(
            Condition::any()
                .add(listing::Column::ExpiredNotified.eq(false))
                .add(
                    Condition::all()
                        .add(listing::Column::SoldAt.is_not_null())
                        .add(listing::Column::SoldNotified.eq(false)),
                ),
        )
        .order_by_asc(listing::Column::Id)
        .all(db)
        .await
}

/// Writes back the fields the cycle engine owns. Immutable columns are left
/// alone.
pub async fn update_listing_state<C: ConnectionTrait>(
    db: &C,
    listing: &Listing,
) -> Result<listing::Model, DbErr> {
    let model = listing::ActiveModel {
        id: Unchanged(listing.id),
        status: Set(listing.status),
        sold_at: Set(listing.sold_at),
        consecutive_failures: Set(i32::try_from(listing.consecutive_failures).unwrap_or(i32::MAX)),
        sold_notified: Set(listing.sold_notified),
        deadline_warning_notified: Set(listing.deadline_warning_notified),
        expired_notified: Set(listing.expired_notified),
        last_weekly_digest_sent_on: Set(listing.last_weekly_digest_sent_on),
        last_checked_at: Set(listing.last_checked_at),
        last_error: Set(listing.last_error.clone()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    model.update(db).await
}
