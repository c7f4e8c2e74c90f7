//! Outbound notification channel: message templates plus the Telegram and
//! webhook senders behind a single dispatch trait.

pub mod models;
pub mod senders;
pub mod service;
pub mod templates;

pub use models::{ChannelConfig, NotificationContext, OutgoingMessage};
pub use service::{NotificationChannel, NotificationError, NotificationService};
