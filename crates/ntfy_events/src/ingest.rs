use std::io::BufRead;

use serde_json::Value;

use crate::config::IngestConfig;
use crate::error::{EventRecord, EventRecordError};
use crate::reader::{BoundedLine, BoundedLineReader};
use crate::Notification;

/// Parses one inbound payload.
///
/// An object is a single notification; an array is a downloaded batch whose elements must all
/// be objects. Anything else is rejected as a whole.
pub fn parse_payload(line: &str) -> Result<Vec<Notification>, EventRecordError> {
    let value: Value =
        serde_json::from_str(line).map_err(|err| EventRecordError::Json(err.to_string()))?;

    match value {
        Value::Object(event) => Ok(vec![Notification::normalize(event)]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(event) => Ok(Notification::normalize(event)),
                other => Err(EventRecordError::Shape {
                    found: json_kind(&other),
                }),
            })
            .collect(),
        other => Err(EventRecordError::Shape {
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Iterates NDJSON notification payloads, one [`EventRecord`] per non-blank line.
pub struct NotificationIngestor<R: BufRead> {
    reader: BoundedLineReader<R>,
    config: IngestConfig,
}

impl<R: BufRead> NotificationIngestor<R> {
    pub fn new(reader: R, config: IngestConfig) -> Self {
        Self {
            reader: BoundedLineReader::new(reader, config.limits.max_line_bytes),
            config,
        }
    }

    fn error_record(line_number: usize, err: EventRecordError) -> EventRecord {
        EventRecord {
            line_number,
            raw: None,
            outcome: Err(err),
        }
    }
}

impl<R: BufRead> Iterator for NotificationIngestor<R> {
    type Item = EventRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.next()? {
                BoundedLine::Io { line_number, kind } => {
                    return Some(Self::error_record(
                        line_number,
                        EventRecordError::Io { kind },
                    ));
                }
                BoundedLine::TooLong {
                    line_number,
                    observed_bytes,
                    max_line_bytes,
                } => {
                    return Some(Self::error_record(
                        line_number,
                        EventRecordError::LineTooLong {
                            observed_bytes,
                            max_line_bytes,
                        },
                    ));
                }
                BoundedLine::Line { line_number, bytes } => {
                    let Ok(raw_line) = String::from_utf8(bytes) else {
                        return Some(Self::error_record(
                            line_number,
                            EventRecordError::InvalidUtf8,
                        ));
                    };
                    let line = raw_line.strip_suffix('\r').unwrap_or(&raw_line);
                    if line.trim().is_empty() {
                        continue;
                    }

                    return Some(EventRecord {
                        line_number,
                        raw: self.config.capture_raw.then(|| line.to_string()),
                        outcome: parse_payload(line),
                    });
                }
            }
        }
    }
}
