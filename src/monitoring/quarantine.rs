//! Time-boxed suppression of notification delivery while failures look
//! systemic rather than listing-specific. The controller gates the outbox
//! only; it never touches listing state.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    PlatformDown,
    SystemicFailureRatio,
    /// Recorded for aborted cycles only; never activates quarantine.
    ConnectivityAbort,
}

impl QuarantineReason {
    pub fn activates_quarantine(&self) -> bool {
        !matches!(self, QuarantineReason::ConnectivityAbort)
    }
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuarantineReason::PlatformDown => write!(f, "platform down"),
            QuarantineReason::SystemicFailureRatio => write!(f, "systemic failure ratio"),
            QuarantineReason::ConnectivityAbort => write!(f, "connectivity lost"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QuarantineState {
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<QuarantineReason>,
}

impl QuarantineState {
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        match (self.active, self.expires_at) {
            (true, Some(expires_at)) if expires_at > now => Some((expires_at - now).num_minutes()),
            (true, Some(_)) => Some(0),
            _ => None,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> QuarantineSnapshot {
        QuarantineSnapshot {
            active: self.active,
            until: self.expires_at.filter(|_| self.active),
            reason: self.reason,
            minutes_remaining: self.minutes_remaining(now),
        }
    }
}

/// Read-only view of the quarantine for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantineSnapshot {
    pub active: bool,
    pub until: Option<DateTime<Utc>>,
    pub reason: Option<QuarantineReason>,
    pub minutes_remaining: Option<i64>,
}

/// What a trigger did to the quarantine window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEffect {
    Activated,
    Extended,
    /// Already active with a later expiry; the window was kept as is.
    Unchanged,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct QuarantineController {
    state: QuarantineState,
    duration: Duration,
}

impl QuarantineController {
    pub fn new(duration: Duration) -> Self {
        Self {
            state: QuarantineState::default(),
            duration,
        }
    }

    pub fn with_state(state: QuarantineState, duration: Duration) -> Self {
        Self { state, duration }
    }

    pub fn state(&self) -> &QuarantineState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Lazily clears an expired quarantine. Returns `true` when it was cleared.
    pub fn clear_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if !self.state.active {
            return false;
        }
        match self.state.expires_at {
            Some(expires_at) if now < expires_at => {
                warn!(
                    quarantine_until = %expires_at,
                    minutes_remaining = (expires_at - now).num_minutes(),
                    reason = ?self.state.reason,
                    "Quarantine still active. Probing continues, notifications are held."
                );
                false
            }
            _ => {
                info!(reason = ?self.state.reason, "Quarantine expired. Notifications resume.");
                self.state = QuarantineState::default();
                true
            }
        }
    }

    /// Activates quarantine or pushes its expiry out. A trigger never shortens
    /// an existing window.
    pub fn trigger(&mut self, reason: QuarantineReason, now: DateTime<Utc>) -> TriggerEffect {
        if !reason.activates_quarantine() {
            return TriggerEffect::Ignored;
        }

        let candidate = now + self.duration;
        let effect = match (self.state.active, self.state.expires_at) {
            (true, Some(current)) if current >= candidate => TriggerEffect::Unchanged,
            (true, _) => TriggerEffect::Extended,
            (false, _) => TriggerEffect::Activated,
        };

        if effect != TriggerEffect::Unchanged {
            self.state = QuarantineState {
                active: true,
                expires_at: Some(candidate),
                reason: Some(reason),
            };
            warn!(
                reason = %reason,
                quarantine_until = %candidate,
                effect = ?effect,
                "Quarantine triggered. Notifications are suppressed."
            );
        }
        effect
    }
}

/// Whether a cycle's aggregate failure ratio counts as a systemic failure.
/// A cycle that probed nothing never does.
pub fn ratio_exceeds(total_failed: u32, total_probed: u32, threshold: f64) -> bool {
    total_probed > 0 && failure_ratio(total_failed, total_probed) >= threshold
}

pub fn failure_ratio(total_failed: u32, total_probed: u32) -> f64 {
    if total_probed == 0 {
        0.0
    } else {
        f64::from(total_failed) / f64::from(total_probed)
    }
}
