//! SeaORM entities mapping the listing and audit tables.

pub mod cycle_audit;
pub mod listing;

pub mod prelude {
    pub use super::cycle_audit::Entity as CycleAudit;
    pub use super::listing::Entity as Listing;
}
