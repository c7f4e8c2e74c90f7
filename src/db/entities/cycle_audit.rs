use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per check cycle; never updated after insertion.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "cycle_audits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub timestamp: ChronoDateTimeUtc,
    pub total_probed: i32,
    pub total_failed: i32,
    pub failure_ratio: f64,
    pub system_healthy: bool,
    pub aborted: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
