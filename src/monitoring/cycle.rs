//! The check cycle: guard, probe fan-out, sequential state transitions and
//! systemic-failure detection. The transitions and the cycle's audit record
//! are committed together before the outbox runs, and the outbox then saves
//! each listing as soon as one of its notifications is confirmed.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::health_guard::{GuardVerdict, HealthGuard};
use super::models::{CycleAuditRecord, Listing};
use super::outbox::{NotificationOutbox, OutboxReport};
use super::prober::{ProbeOutcome, Prober};
use super::quarantine::{
    QuarantineController, QuarantineReason, QuarantineSnapshot, QuarantineState, failure_ratio,
    ratio_exceeds,
};
use super::state_machine::LifecyclePolicy;
use super::store::{ListingStore, StoreError};
use crate::db::enums::ListingStatus;
use crate::notifications::service::NotificationChannel;
use crate::server::config::MonitorConfig;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub verdict: GuardVerdict,
    pub aborted: bool,
    pub total_probed: u32,
    pub total_failed: u32,
    pub failure_ratio: f64,
    pub newly_sold: u32,
    pub newly_expired: u32,
    pub quarantine: QuarantineState,
    pub outbox: OutboxReport,
}

impl CycleReport {
    fn aborted(quarantine: QuarantineState) -> Self {
        CycleReport {
            verdict: GuardVerdict::NoConnectivity,
            aborted: true,
            total_probed: 0,
            total_failed: 0,
            failure_ratio: 0.0,
            newly_sold: 0,
            newly_expired: 0,
            quarantine,
            outbox: OutboxReport::default(),
        }
    }
}

/// Tunables the orchestrator reads on every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSettings {
    pub probe_timeout: Duration,
    pub worker_pool_size: usize,
    pub batch_size: usize,
    pub cycle_listing_limit: Option<usize>,
    pub systemic_failure_ratio: f64,
}

impl From<&MonitorConfig> for CycleSettings {
    fn from(config: &MonitorConfig) -> Self {
        CycleSettings {
            probe_timeout: config.probe_timeout(),
            worker_pool_size: config.worker_pool_size.max(1),
            batch_size: config.batch_size.max(1),
            cycle_listing_limit: config.cycle_listing_limit,
            systemic_failure_ratio: config.systemic_failure_ratio,
        }
    }
}

pub struct CycleOrchestrator {
    settings: CycleSettings,
    policy: LifecyclePolicy,
    prober: Arc<dyn Prober>,
    guard: HealthGuard,
    store: Arc<dyn ListingStore>,
    outbox: NotificationOutbox,
    quarantine: Mutex<QuarantineController>,
    quarantine_tx: watch::Sender<QuarantineState>,
    running: Mutex<()>,
}

impl CycleOrchestrator {
    pub fn new(
        config: &MonitorConfig,
        prober: Arc<dyn Prober>,
        store: Arc<dyn ListingStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        let guard = HealthGuard::new(
            prober.clone(),
            config.connectivity_endpoints.clone(),
            config.platform_endpoints.clone(),
            config.guard_timeout(),
        );
        Self::with_parts(
            CycleSettings::from(config),
            LifecyclePolicy::from(config),
            prober,
            guard,
            store,
            channel,
            QuarantineController::new(config.quarantine_duration()),
        )
    }

    pub fn with_parts(
        settings: CycleSettings,
        policy: LifecyclePolicy,
        prober: Arc<dyn Prober>,
        guard: HealthGuard,
        store: Arc<dyn ListingStore>,
        channel: Arc<dyn NotificationChannel>,
        quarantine: QuarantineController,
    ) -> Self {
        let (quarantine_tx, _) = watch::channel(quarantine.state().clone());
        Self {
            settings,
            policy,
            prober,
            guard,
            store: store.clone(),
            outbox: NotificationOutbox::new(channel, store.clone()),
            quarantine: Mutex::new(quarantine),
            quarantine_tx,
            running: Mutex::new(()),
        }
    }

    pub fn subscribe_quarantine(&self) -> watch::Receiver<QuarantineState> {
        self.quarantine_tx.subscribe()
    }

    pub async fn quarantine_snapshot(&self, now: DateTime<Utc>) -> QuarantineSnapshot {
        self.quarantine.lock().await.state().snapshot(now)
    }

    /// Drives cycles on a fixed cadence until the task is dropped. A tick that
    /// fires while the previous cycle is still running is skipped.
    pub async fn start_periodic_cycles(self: Arc<Self>, period: Duration) {
        info!(
            interval_seconds = period.as_secs(),
            "Periodic check cycles started."
        );
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let this = self.clone();
            tokio::spawn(async move {
                match this.try_run_cycle(Utc::now()).await {
                    None => warn!("Previous check cycle still running. Skipping this tick."),
                    Some(Err(e)) => {
                        error!(error = %e, "Check cycle failed. Retrying on the next tick.")
                    }
                    Some(Ok(_)) => {}
                }
            });
        }
    }

    /// Runs a cycle unless one is already in progress, in which case `None`.
    pub async fn try_run_cycle(
        &self,
        now: DateTime<Utc>,
    ) -> Option<Result<CycleReport, CycleError>> {
        let _running = self.running.try_lock().ok()?;
        Some(self.execute(now).await)
    }

    /// Runs one cycle, waiting for any cycle in progress to finish first.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let _running = self.running.lock().await;
        self.execute(now).await
    }

    async fn execute(&self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        info!(timestamp = %now, "Check cycle started.");
        {
            let mut quarantine = self.quarantine.lock().await;
            if quarantine.clear_if_expired(now) {
                self.publish(&quarantine);
            }
        }

        let verdict = self.guard.check().await;
        if verdict == GuardVerdict::NoConnectivity {
            let record = CycleAuditRecord::aborted(
                now,
                format!("Cycle aborted: {}.", QuarantineReason::ConnectivityAbort),
            );
            self.store.append_audit_record(&record).await?;
            let state = self.quarantine.lock().await.state().clone();
            warn!("Check cycle aborted. No listing was probed or changed.");
            return Ok(CycleReport::aborted(state));
        }
        if verdict == GuardVerdict::PlatformDown {
            let mut quarantine = self.quarantine.lock().await;
            quarantine.trigger(QuarantineReason::PlatformDown, now);
            self.publish(&quarantine);
        }

        let mut listings = self.store.load_active_and_sold_listings().await?;
        listings.extend(self.store.load_unnotified_expired_listings().await?);
        let loaded = listings.clone();

        let mut newly_expired = 0;
        for listing in listings.iter_mut() {
            if self.policy.apply_deadline(listing, now) {
                newly_expired += 1;
            }
        }

        let probe = self.probe_listings(&mut listings, now).await;
        let ratio = failure_ratio(probe.failed, probe.probed);
        let systemic = ratio_exceeds(
            probe.failed,
            probe.probed,
            self.settings.systemic_failure_ratio,
        );

        let quarantine_state = {
            let mut quarantine = self.quarantine.lock().await;
            if systemic {
                warn!(
                    failure_ratio = ratio,
                    threshold = self.settings.systemic_failure_ratio,
                    total_probed = probe.probed,
                    total_failed = probe.failed,
                    "Failure ratio indicates a systemic problem."
                );
                quarantine.trigger(QuarantineReason::SystemicFailureRatio, now);
            }
            self.publish(&quarantine);
            quarantine.state().clone()
        };

        let changed: Vec<Listing> = listings
            .iter()
            .zip(&loaded)
            .filter(|(current, before)| current != before)
            .map(|(current, _)| current.clone())
            .collect();

        let system_healthy = verdict == GuardVerdict::Healthy && !systemic;
        let record = CycleAuditRecord {
            timestamp: now,
            total_probed: probe.probed,
            total_failed: probe.failed,
            failure_ratio: ratio,
            system_healthy,
            aborted: false,
            note: audit_note(verdict, systemic, ratio, &quarantine_state),
        };

        if let Err(e) = self.store.commit_cycle(&changed, &record).await {
            error!(error = %e, changed = changed.len(), "Failed to persist check cycle.");
            return Err(e.into());
        }

        let outbox = self
            .outbox
            .flush(&self.policy, &mut listings, quarantine_state.active, now)
            .await;

        info!(
            total_probed = probe.probed,
            total_failed = probe.failed,
            failure_ratio = ratio,
            newly_sold = probe.newly_sold,
            newly_expired,
            delivered = outbox.delivered,
            deferred = outbox.deferred,
            failed_deliveries = outbox.failed,
            unsaved_deliveries = outbox.unsaved,
            quarantine_active = quarantine_state.active,
            "Check cycle finished."
        );

        Ok(CycleReport {
            verdict,
            aborted: false,
            total_probed: probe.probed,
            total_failed: probe.failed,
            failure_ratio: ratio,
            newly_sold: probe.newly_sold,
            newly_expired,
            quarantine: quarantine_state,
            outbox,
        })
    }

    /// Probes active listings batch by batch. Probes within a batch run on the
    /// worker pool; results are applied here, one at a time.
    async fn probe_listings(&self, listings: &mut [Listing], now: DateTime<Utc>) -> ProbeTally {
        let limit = self.settings.cycle_listing_limit.unwrap_or(usize::MAX);
        let targets: Vec<(usize, String)> = listings
            .iter()
            .enumerate()
            .filter(|(_, l)| l.status == ListingStatus::Active)
            .take(limit)
            .map(|(idx, l)| (idx, l.url.clone()))
            .collect();

        let mut tally = ProbeTally::default();
        for batch in targets.chunks(self.settings.batch_size) {
            let outcomes: Vec<(usize, ProbeOutcome)> = stream::iter(batch.iter().cloned())
                .map(|(idx, url)| {
                    let prober = self.prober.clone();
                    let timeout = self.settings.probe_timeout;
                    async move {
                        let outcome = tokio::time::timeout(timeout, prober.probe(&url, timeout))
                            .await
                            .unwrap_or(ProbeOutcome::Timeout);
                        (idx, outcome)
                    }
                })
                .buffer_unordered(self.settings.worker_pool_size)
                .collect()
                .await;

            for (idx, outcome) in outcomes {
                let listing = &mut listings[idx];
                tally.probed += 1;
                if !outcome.is_success() {
                    tally.failed += 1;
                }
                debug!(listing_id = listing.id, outcome = %outcome, "Applying probe result.");
                let transition = self.policy.apply_probe_outcome(listing, outcome, now);
                if transition == Some(ListingStatus::Sold) {
                    tally.newly_sold += 1;
                }
            }
        }
        tally
    }

    fn publish(&self, quarantine: &QuarantineController) {
        self.quarantine_tx.send_replace(quarantine.state().clone());
    }
}

#[derive(Debug, Default)]
struct ProbeTally {
    probed: u32,
    failed: u32,
    newly_sold: u32,
}

fn audit_note(
    verdict: GuardVerdict,
    systemic: bool,
    ratio: f64,
    quarantine: &QuarantineState,
) -> Option<String> {
    let mut reasons = Vec::new();
    if verdict == GuardVerdict::PlatformDown {
        reasons.push(QuarantineReason::PlatformDown.to_string());
    }
    if systemic {
        reasons.push(format!(
            "{} ({:.0}% failed)",
            QuarantineReason::SystemicFailureRatio,
            ratio * 100.0
        ));
    }
    if quarantine.active {
        if let Some(until) = quarantine.expires_at {
            reasons.push(format!("notifications quarantined until {until}"));
        }
    }
    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    }
}
