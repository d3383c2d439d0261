use std::io;

use thiserror::Error;

use crate::Notification;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EventRecordError {
    #[error("I/O error while reading notification stream ({kind:?})")]
    Io { kind: io::ErrorKind },
    #[error("invalid UTF-8 in notification stream")]
    InvalidUtf8,
    #[error("line too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    #[error("invalid notification JSON: {0}")]
    Json(String),
    #[error("unsupported notification payload: expected an object or an array of objects, got {found}")]
    Shape { found: &'static str },
}

/// Outcome of one non-blank line of the inbound stream.
///
/// A successful line yields one notification, or several when the provider sent a batch.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub line_number: usize,
    pub raw: Option<String>,
    pub outcome: Result<Vec<Notification>, EventRecordError>,
}
