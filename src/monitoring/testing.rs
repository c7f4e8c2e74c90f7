//! In-memory fakes for the engine's collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::models::{CycleAuditRecord, Listing, NotificationKind};
use super::prober::{ProbeOutcome, Prober};
use super::store::{ListingStore, StoreError};
use crate::db::enums::{ChannelKind, ListingStatus};
use crate::notifications::models::NotificationContext;
use crate::notifications::senders::SenderError;
use crate::notifications::service::{NotificationChannel, NotificationError};

pub fn listing(id: i32, consignment_date: NaiveDate) -> Listing {
    Listing {
        id,
        url: listing_url(id),
        title: None,
        consignment_date,
        channel: ChannelKind::Telegram,
        recipient: format!("chat-{id}"),
        status: ListingStatus::Active,
        sold_at: None,
        consecutive_failures: 0,
        sold_notified: false,
        deadline_warning_notified: false,
        expired_notified: false,
        last_weekly_digest_sent_on: None,
        last_checked_at: None,
        last_error: None,
    }
}

pub fn listing_url(id: i32) -> String {
    format!("https://platform.test/listing/{id}")
}

/// Answers each URL from a script. Queued outcomes are consumed in order
/// and the last one repeats; unknown URLs succeed.
#[derive(Default)]
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<ProbeOutcome>>>,
    hangs: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: impl Into<String>, outcome: ProbeOutcome) -> Self {
        self.push(url, outcome);
        self
    }

    pub fn push(&self, url: impl Into<String>, outcome: ProbeOutcome) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(outcome);
    }

    /// Replaces the script for `url` with a single repeating outcome.
    pub fn set(&self, url: impl Into<String>, outcome: ProbeOutcome) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.into(), VecDeque::from([outcome]));
    }

    /// Makes every probe of `url` sleep before answering.
    pub fn with_hang(self, url: impl Into<String>, delay: Duration) -> Self {
        self.hangs.lock().unwrap().insert(url.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, url: &str, _timeout: Duration) -> ProbeOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        let hang = self.hangs.lock().unwrap().get(url).copied();
        if let Some(delay) = hang {
            tokio::time::sleep(delay).await;
        }

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(ProbeOutcome::Success),
            Some(queue) => queue.front().copied().unwrap_or(ProbeOutcome::Success),
            None => ProbeOutcome::Success,
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    listings: Mutex<BTreeMap<i32, Listing>>,
    audits: Mutex<Vec<CycleAuditRecord>>,
    failing: AtomicBool,
    saves_failing: AtomicBool,
}

impl InMemoryStore {
    pub fn new(listings: impl IntoIterator<Item = Listing>) -> Self {
        let store = Self::default();
        {
            let mut map = store.listings.lock().unwrap();
            for listing in listings {
                map.insert(listing.id, listing);
            }
        }
        store
    }

    pub fn listing(&self, id: i32) -> Listing {
        self.listings.lock().unwrap()[&id].clone()
    }

    pub fn all(&self) -> Vec<Listing> {
        self.listings.lock().unwrap().values().cloned().collect()
    }

    pub fn audits(&self) -> Vec<CycleAuditRecord> {
        self.audits.lock().unwrap().clone()
    }

    /// Makes every write fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes single-listing saves fail while whole-cycle commits still go
    /// through.
    pub fn set_saves_failing(&self, failing: bool) {
        self.saves_failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sea_orm::DbErr::Custom(
                "store unavailable".to_string(),
            )));
        }
        Ok(())
    }

    fn write(&self, listing: &Listing) -> Result<(), StoreError> {
        let mut map = self.listings.lock().unwrap();
        match map.get_mut(&listing.id) {
            Some(existing) => {
                *existing = listing.clone();
                Ok(())
            }
            None => Err(StoreError::ListingNotFound(listing.id)),
        }
    }
}

#[async_trait]
impl ListingStore for InMemoryStore {
    async fn load_active_and_sold_listings(&self) -> Result<Vec<Listing>, StoreError> {
        let mut listings: Vec<Listing> = self
            .listings
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.status != ListingStatus::Expired)
            .cloned()
            .collect();
        listings.sort_by_key(|l| l.last_checked_at);
        Ok(listings)
    }

    async fn load_unnotified_expired_listings(&self) -> Result<Vec<Listing>, StoreError> {
        Ok(self
            .listings
            .lock()
            .unwrap()
            .values()
            .filter(|l| {
                l.status == ListingStatus::Expired
                    && (!l.expired_notified || (l.sold_at.is_some() && !l.sold_notified))
            })
            .cloned()
            .collect())
    }

    async fn save_listing(&self, listing: &Listing) -> Result<(), StoreError> {
        self.check_writable()?;
        if self.saves_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sea_orm::DbErr::Custom(
                "listing save rejected".to_string(),
            )));
        }
        self.write(listing)
    }

    async fn append_audit_record(&self, record: &CycleAuditRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.audits.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn commit_cycle(
        &self,
        listings: &[Listing],
        record: &CycleAuditRecord,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        for listing in listings {
            self.write(listing)?;
        }
        self.audits.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub listing_id: i32,
    pub recipient: String,
    pub kind: NotificationKind,
}

/// Records every confirmed send. Recipients marked as failing get a
/// delivery error instead.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SentNotification>>,
    failing_recipients: Mutex<Vec<String>>,
    attempts: Mutex<usize>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .push(recipient.to_string());
    }

    pub fn recover(&self) {
        self.failing_recipients.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_kinds(&self, listing_id: i32) -> Vec<NotificationKind> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.listing_id == listing_id)
            .map(|n| n.kind)
            .collect()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(
        &self,
        _channel: ChannelKind,
        recipient: &str,
        kind: NotificationKind,
        context: &NotificationContext,
    ) -> Result<(), NotificationError> {
        *self.attempts.lock().unwrap() += 1;
        if self
            .failing_recipients
            .lock()
            .unwrap()
            .iter()
            .any(|r| r == recipient)
        {
            return Err(SenderError::SendFailed(format!("{recipient} unreachable")).into());
        }
        self.sent.lock().unwrap().push(SentNotification {
            listing_id: context.listing_id,
            recipient: recipient.to_string(),
            kind,
        });
        Ok(())
    }
}
