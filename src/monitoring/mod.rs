//! The check-cycle engine: probing, health guards, lifecycle transitions,
//! quarantine and the notification outbox, driven by the cycle orchestrator.

pub mod cycle;
pub mod health_guard;
pub mod models;
pub mod outbox;
pub mod prober;
pub mod quarantine;
pub mod state_machine;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::{CycleError, CycleOrchestrator, CycleReport, CycleSettings};
pub use health_guard::{GuardVerdict, HealthGuard};
pub use models::{CycleAuditRecord, Listing, NotificationKind};
pub use prober::{HttpProber, ProbeOutcome, Prober};
pub use quarantine::{QuarantineController, QuarantineReason, QuarantineSnapshot, QuarantineState};
pub use state_machine::LifecyclePolicy;
pub use store::{ListingStore, StoreError};
