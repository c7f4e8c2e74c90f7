use serde::{Deserialize, Serialize};

use crate::db::enums::ListingStatus;
use crate::monitoring::models::{Listing, NotificationKind};
use crate::monitoring::state_machine::DeadlineInfo;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Delivery target resolved for one listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChannelConfig {
    Telegram { bot_token: String, chat_id: String },
    Webhook { url: String },
}

/// Listing fields exposed to message templates and webhook payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub listing_id: i32,
    pub url: String,
    pub title: Option<String>,
    pub status: ListingStatus,
    pub consignment_date: String,
    pub deadline_date: String,
    pub deadline_days: i64,
    pub days_elapsed: i64,
    pub days_remaining: i64,
    pub percent_elapsed: u32,
    pub consecutive_failures: u32,
}

impl NotificationContext {
    pub fn new(listing: &Listing, deadline: &DeadlineInfo, deadline_days: i64) -> Self {
        NotificationContext {
            listing_id: listing.id,
            url: listing.url.clone(),
            title: listing.title.clone(),
            status: listing.status,
            consignment_date: listing.consignment_date.format(DATE_FORMAT).to_string(),
            deadline_date: deadline.deadline_date.format(DATE_FORMAT).to_string(),
            deadline_days,
            days_elapsed: deadline.days_elapsed.max(0),
            days_remaining: deadline.days_remaining,
            percent_elapsed: deadline.percent_elapsed.round() as u32,
            consecutive_failures: listing.consecutive_failures,
        }
    }
}

/// A rendered message ready for a sender.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage<'a> {
    pub kind: NotificationKind,
    pub text: &'a str,
    pub context: &'a NotificationContext,
}
