//! Query functions over the listing and audit tables. Every function takes any
//! sea-orm connection, so the same calls run inside or outside a transaction.

pub mod audit_service;
pub mod listing_service;

pub use audit_service::*;
pub use listing_service::*;
