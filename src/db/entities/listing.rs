use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{ChannelKind, ListingStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "listings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    #[sea_orm(nullable)]
    pub title: Option<String>,
    pub consignment_date: ChronoDate,
    pub channel: ChannelKind,
    pub recipient: String,
    pub status: ListingStatus,
    #[sea_orm(nullable)]
    pub sold_at: Option<ChronoDateTimeUtc>,
    pub consecutive_failures: i32,
    pub sold_notified: bool,
    pub deadline_warning_notified: bool,
    pub expired_notified: bool,
    #[sea_orm(nullable)]
    pub last_weekly_digest_sent_on: Option<ChronoDate>,
    #[sea_orm(nullable)]
    pub last_checked_at: Option<ChronoDateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_error: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
