use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::entities::{cycle_audit, listing};
use crate::db::enums::{ChannelKind, ListingStatus};

/// A monitored listing as seen by the engine, independent of storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub id: i32,
    pub url: String,
    pub title: Option<String>,
    pub consignment_date: NaiveDate,
    pub channel: ChannelKind,
    pub recipient: String,
    pub status: ListingStatus,
    /// When the listing was inferred sold; kept after it expires.
    pub sold_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub sold_notified: bool,
    pub deadline_warning_notified: bool,
    pub expired_notified: bool,
    pub last_weekly_digest_sent_on: Option<NaiveDate>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl From<listing::Model> for Listing {
    fn from(model: listing::Model) -> Self {
        Listing {
            id: model.id,
            url: model.url,
            title: model.title,
            consignment_date: model.consignment_date,
            channel: model.channel,
            recipient: model.recipient,
            status: model.status,
            sold_at: model.sold_at,
            consecutive_failures: u32::try_from(model.consecutive_failures).unwrap_or(0),
            sold_notified: model.sold_notified,
            deadline_warning_notified: model.deadline_warning_notified,
            expired_notified: model.expired_notified,
            last_weekly_digest_sent_on: model.last_weekly_digest_sent_on,
            last_checked_at: model.last_checked_at,
            last_error: model.last_error,
        }
    }
}

/// The one-time (or once-per-week) messages a listing can owe its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Sold,
    DeadlineWarning,
    Expired,
    WeeklyDigest,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationKind::Sold => "sold",
            NotificationKind::DeadlineWarning => "deadline_warning",
            NotificationKind::Expired => "expired",
            NotificationKind::WeeklyDigest => "weekly_digest",
        };
        f.write_str(label)
    }
}

/// Append-only summary of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleAuditRecord {
    pub timestamp: DateTime<Utc>,
    pub total_probed: u32,
    pub total_failed: u32,
    pub failure_ratio: f64,
    pub system_healthy: bool,
    pub aborted: bool,
    pub note: Option<String>,
}

impl CycleAuditRecord {
    /// Record for a cycle abandoned before any listing was touched.
    pub fn aborted(timestamp: DateTime<Utc>, note: impl Into<String>) -> Self {
        CycleAuditRecord {
            timestamp,
            total_probed: 0,
            total_failed: 0,
            failure_ratio: 0.0,
            system_healthy: false,
            aborted: true,
            note: Some(note.into()),
        }
    }
}

impl From<cycle_audit::Model> for CycleAuditRecord {
    fn from(model: cycle_audit::Model) -> Self {
        CycleAuditRecord {
            timestamp: model.timestamp,
            total_probed: u32::try_from(model.total_probed).unwrap_or(0),
            total_failed: u32::try_from(model.total_failed).unwrap_or(0),
            failure_ratio: model.failure_ratio,
            system_healthy: model.system_healthy,
            aborted: model.aborted,
            note: model.note,
        }
    }
}
