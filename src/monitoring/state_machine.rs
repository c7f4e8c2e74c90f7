//! Per-listing lifecycle: `Active -> Sold -> Expired`, with `Active -> Expired`
//! allowed directly. Transitions are driven by consecutive probe failures and
//! by the fixed deadline counted from the consignment date.
//!
//! Pending notifications are never stored separately. A notification is
//! pending whenever its trigger holds and the listing's matching flag (or
//! last-sent date) says it has not been delivered yet.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use tracing::info;

use super::models::{Listing, NotificationKind};
use super::prober::{ProbeOutcome, SignalStrength};
use crate::db::enums::ListingStatus;
use crate::server::config::MonitorConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct LifecyclePolicy {
    pub strong_failure_threshold: u32,
    pub weak_failure_threshold: u32,
    pub deadline_days: i64,
    pub warning_window_days: i64,
    pub digest_weekday: Weekday,
    pub digest_hour: u32,
}

impl From<&MonitorConfig> for LifecyclePolicy {
    fn from(config: &MonitorConfig) -> Self {
        LifecyclePolicy {
            strong_failure_threshold: config.strong_failure_threshold,
            weak_failure_threshold: config.weak_failure_threshold,
            deadline_days: config.deadline_days,
            warning_window_days: config.warning_window_days,
            digest_weekday: config.weekly_digest_weekday,
            digest_hour: config.weekly_digest_hour,
        }
    }
}

/// Where a listing stands relative to its deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineInfo {
    pub deadline_date: NaiveDate,
    pub days_elapsed: i64,
    pub days_remaining: i64,
    pub percent_elapsed: f64,
}

impl LifecyclePolicy {
    pub fn threshold_for(&self, strength: SignalStrength) -> u32 {
        match strength {
            SignalStrength::Strong => self.strong_failure_threshold,
            SignalStrength::Weak => self.weak_failure_threshold,
        }
    }

    pub fn deadline_date(&self, listing: &Listing) -> NaiveDate {
        listing.consignment_date + Duration::days(self.deadline_days)
    }

    /// Start of the deadline day, UTC.
    pub fn deadline_at(&self, listing: &Listing) -> DateTime<Utc> {
        self.deadline_date(listing).and_time(NaiveTime::MIN).and_utc()
    }

    pub fn deadline_info(&self, listing: &Listing, now: DateTime<Utc>) -> DeadlineInfo {
        let today = now.date_naive();
        let deadline_date = self.deadline_date(listing);
        let days_elapsed = (today - listing.consignment_date).num_days();
        let percent_elapsed = if self.deadline_days > 0 {
            (days_elapsed as f64 / self.deadline_days as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };

        DeadlineInfo {
            deadline_date,
            days_elapsed,
            days_remaining: (deadline_date - today).num_days().max(0),
            percent_elapsed,
        }
    }

    /// Applies one probe result. Returns the new status when the listing
    /// transitioned. Expired listings are left untouched.
    pub fn apply_probe_outcome(
        &self,
        listing: &mut Listing,
        outcome: ProbeOutcome,
        now: DateTime<Utc>,
    ) -> Option<ListingStatus> {
        if listing.status == ListingStatus::Expired {
            return None;
        }
        listing.last_checked_at = Some(now);

        let Some(strength) = outcome.signal_strength() else {
            if listing.status == ListingStatus::Active {
                listing.consecutive_failures = 0;
            }
            listing.last_error = None;
            return None;
        };

        listing.consecutive_failures = listing.consecutive_failures.saturating_add(1);
        listing.last_error = Some(outcome.to_string());

        let threshold = self.threshold_for(strength);
        if listing.status == ListingStatus::Active && listing.consecutive_failures >= threshold {
            info!(
                listing_id = listing.id,
                outcome = %outcome,
                consecutive_failures = listing.consecutive_failures,
                threshold,
                "Listing went offline. Marking as sold."
            );
            listing.status = ListingStatus::Sold;
            listing.sold_at = Some(now);
            return Some(ListingStatus::Sold);
        }
        None
    }

    /// Moves the listing to `Expired` once the deadline is reached, whatever
    /// its current status. Returns `true` on transition. `sold_at` survives,
    /// so an undelivered sold notice is still owed afterwards.
    pub fn apply_deadline(&self, listing: &mut Listing, now: DateTime<Utc>) -> bool {
        if listing.status == ListingStatus::Expired || now < self.deadline_at(listing) {
            return false;
        }
        info!(
            listing_id = listing.id,
            previous_status = %listing.status,
            deadline = %self.deadline_date(listing),
            "Deadline reached. Marking listing as expired."
        );
        listing.status = ListingStatus::Expired;
        true
    }

    pub fn deadline_warning_due(&self, listing: &Listing, now: DateTime<Utc>) -> bool {
        if listing.deadline_warning_notified || listing.status == ListingStatus::Expired {
            return false;
        }
        let deadline_at = self.deadline_at(listing);
        let warning_from = deadline_at - Duration::days(self.warning_window_days);
        now >= warning_from && now < deadline_at
    }

    /// The digest slot of the ISO week `now` falls in.
    pub fn digest_slot(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let monday = today.week(Weekday::Mon).first_day();
        let offset = i64::from(self.digest_weekday.num_days_from_monday());
        let slot_day = monday + Duration::days(offset);
        slot_day.and_time(NaiveTime::MIN).and_utc() + Duration::hours(i64::from(self.digest_hour))
    }

    /// Due from the weekly slot until the end of that ISO week, so a digest
    /// held back by quarantine still goes out once it lifts.
    pub fn weekly_digest_due(&self, listing: &Listing, now: DateTime<Utc>) -> bool {
        if listing.status == ListingStatus::Expired || now < self.digest_slot(now) {
            return false;
        }
        // Nothing to report on the consignment day itself.
        if (now.date_naive() - listing.consignment_date).num_days() < 1
            || now >= self.deadline_at(listing)
        {
            return false;
        }
        match listing.last_weekly_digest_sent_on {
            Some(sent_on) => sent_on.iso_week() != now.date_naive().iso_week(),
            None => true,
        }
    }

    /// A sale stays owed after the listing expires, as long as it was
    /// recorded and never confirmed.
    pub fn sold_notice_due(&self, listing: &Listing) -> bool {
        if listing.sold_notified {
            return false;
        }
        match listing.status {
            ListingStatus::Active => false,
            ListingStatus::Sold => true,
            ListingStatus::Expired => listing.sold_at.is_some(),
        }
    }

    /// Every notification the listing currently owes, in delivery order.
    pub fn pending_notifications(
        &self,
        listing: &Listing,
        now: DateTime<Utc>,
    ) -> Vec<NotificationKind> {
        let mut pending = Vec::new();
        if self.sold_notice_due(listing) {
            pending.push(NotificationKind::Sold);
        }
        if self.deadline_warning_due(listing, now) {
            pending.push(NotificationKind::DeadlineWarning);
        }
        if listing.status == ListingStatus::Expired && !listing.expired_notified {
            pending.push(NotificationKind::Expired);
        }
        if self.weekly_digest_due(listing, now) {
            pending.push(NotificationKind::WeeklyDigest);
        }
        pending
    }
}
