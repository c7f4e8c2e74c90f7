use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryOrder, QuerySelect};

use crate::db::entities::{cycle_audit, prelude::CycleAudit};
use crate::monitoring::models::CycleAuditRecord;

pub const DEFAULT_AUDIT_HISTORY_LIMIT: u64 = 50;

pub async fn append_audit_record<C: ConnectionTrait>(
    db: &C,
    record: &CycleAuditRecord,
) -> Result<cycle_audit::Model, DbErr> {
    let model = cycle_audit::ActiveModel {
        timestamp: Set(record.timestamp),
        total_probed: Set(i32::try_from(record.total_probed).unwrap_or(i32::MAX)),
        total_failed: Set(i32::try_from(record.total_failed).unwrap_or(i32::MAX)),
        failure_ratio: Set(record.failure_ratio),
        system_healthy: Set(record.system_healthy),
        aborted: Set(record.aborted),
        note: Set(record.note.clone()),
        ..Default::default()
    };
    model.insert(db).await
}

/// Most recent cycle records, newest first.
pub async fn recent_audit_records<C: ConnectionTrait>(
    db: &C,
    limit: u64,
) -> Result<Vec<CycleAuditRecord>, DbErr> {
    let models = CycleAudit::find()
        .order_by_desc(cycle_audit::Column::Timestamp)
        .order_by_desc(cycle_audit::Column::Id)
        .limit(limit)
        .all(db)
        .await?;
    Ok(models.into_iter().map(CycleAuditRecord::from).collect())
}
