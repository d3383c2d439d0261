#![forbid(unsafe_code)]
//! Notification records and inbound event ingestion for the ntfy real-time client.
//!
//! - [`Notification`] normalizes a provider event into a fixed-shape record.
//! - [`NotificationIngestor`] reads newline-delimited JSON events from any [`std::io::BufRead`]
//!   with a bounded per-line memory budget.

mod config;
mod error;
mod ingest;
mod notification;
mod reader;

pub use config::{IngestConfig, IngestLimits};
pub use error::{EventRecord, EventRecordError};
pub use ingest::{parse_payload, NotificationIngestor};
pub use notification::{Notification, CANONICAL_FIELDS};
