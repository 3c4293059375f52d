pub mod client;
pub mod models;

pub use client::NordigenClient;
pub use models::{ApiError, RawFeed, RawRecord, Requisition};

/// Requisition status meaning the end-user authorization is live.
pub const STATUS_LINKED: &str = "LN";
