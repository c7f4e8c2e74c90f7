//! Delivery of pending notifications. A listing's "notified" flags (and its
//! last digest date) are the only record of what was sent, so they are set
//! only after the channel confirms and stay unset on failure or while
//! quarantined. The next flush picks the leftovers up again.
//!
//! Each confirmed send is saved straight away. When that save fails the
//! delivery is remembered in memory and reapplied on later flushes until a
//! save goes through, so the message is not sent twice.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::models::{Listing, NotificationKind};
use super::state_machine::LifecyclePolicy;
use super::store::{ListingStore, StoreError};
use crate::notifications::models::NotificationContext;
use crate::notifications::service::NotificationChannel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxReport {
    pub delivered: u32,
    pub failed: u32,
    /// Held back by an active quarantine.
    pub deferred: u32,
    /// Delivered, but the flag could not be saved yet.
    pub unsaved: u32,
}

type Delivery = (NotificationKind, DateTime<Utc>);

pub struct NotificationOutbox {
    channel: Arc<dyn NotificationChannel>,
    store: Arc<dyn ListingStore>,
    unsaved: Mutex<HashMap<i32, Vec<Delivery>>>,
}

impl NotificationOutbox {
    pub fn new(channel: Arc<dyn NotificationChannel>, store: Arc<dyn ListingStore>) -> Self {
        Self {
            channel,
            store,
            unsaved: Mutex::new(HashMap::new()),
        }
    }

    pub async fn flush(
        &self,
        policy: &LifecyclePolicy,
        listings: &mut [Listing],
        quarantine_active: bool,
        now: DateTime<Utc>,
    ) -> OutboxReport {
        let mut report = OutboxReport::default();
        let mut unsaved = self.unsaved.lock().await;

        for listing in listings.iter_mut() {
            if let Some(deliveries) = unsaved.get(&listing.id) {
                for (kind, sent_at) in deliveries {
                    mark_delivered(listing, *kind, *sent_at);
                }
                match self.store.save_listing(listing).await {
                    Ok(()) | Err(StoreError::ListingNotFound(_)) => {
                        unsaved.remove(&listing.id);
                    }
                    Err(e) => warn!(
                        listing_id = listing.id,
                        error = %e,
                        "Still unable to save earlier deliveries."
                    ),
                }
            }

            let pending = policy.pending_notifications(listing, now);
            if pending.is_empty() {
                continue;
            }
            if quarantine_active {
                report.deferred += pending.len() as u32;
                continue;
            }

            let deadline = policy.deadline_info(listing, now);
            let context = NotificationContext::new(listing, &deadline, policy.deadline_days);
            for kind in pending {
                match self
                    .channel
                    .send(listing.channel, &listing.recipient, kind, &context)
                    .await
                {
                    Ok(()) => {
                        mark_delivered(listing, kind, now);
                        report.delivered += 1;
                        info!(listing_id = listing.id, kind = %kind, "Notification sent.");
                        match self.store.save_listing(listing).await {
                            Ok(()) | Err(StoreError::ListingNotFound(_)) => {
                                unsaved.remove(&listing.id);
                            }
                            Err(e) => {
                                report.unsaved += 1;
                                unsaved.entry(listing.id).or_default().push((kind, now));
                                error!(
                                    listing_id = listing.id,
                                    kind = %kind,
                                    error = %e,
                                    "Notification sent but its flag could not be saved. Holding it in memory."
                                );
                            }
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        error!(
                            listing_id = listing.id,
                            kind = %kind,
                            error = %e,
                            "Failed to deliver notification. It stays pending for the next cycle."
                        );
                    }
                }
            }
        }

        if report.deferred > 0 {
            info!(
                deferred = report.deferred,
                "Quarantine active. Pending notifications held back."
            );
        }
        report
    }
}

fn mark_delivered(listing: &mut Listing, kind: NotificationKind, now: DateTime<Utc>) {
    match kind {
        NotificationKind::Sold => listing.sold_notified = true,
        NotificationKind::DeadlineWarning => listing.deadline_warning_notified = true,
        NotificationKind::Expired => listing.expired_notified = true,
        NotificationKind::WeeklyDigest => {
            listing.last_weekly_digest_sent_on = Some(now.date_naive());
        }
    }
}
