pub mod server;

pub mod db;
pub mod monitoring;
pub mod notifications;
