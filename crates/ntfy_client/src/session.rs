use std::io::BufRead;

use ntfy_events::{EventRecord, NotificationIngestor};
use tracing::{debug, error, info, warn};

use crate::{NotificationDispatcher, SessionError};

/// Supplier of already-authenticated inbound events.
///
/// The provider connection (login, keep-alive, reconnects) lives behind this trait; the
/// session only sees decoded records.
pub trait EventSource {
    /// Next record, or `None` once the source is exhausted.
    fn next_record(&mut self) -> Option<EventRecord>;
}

impl<R: BufRead> EventSource for NotificationIngestor<R> {
    fn next_record(&mut self) -> Option<EventRecord> {
        self.next()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Stop at the first dispatch error instead of logging it and moving on.
    pub halt_on_dispatch_error: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub records: usize,
    pub notifications: usize,
    pub dispatched: usize,
    pub skipped: usize,
    pub ingest_errors: usize,
    pub dispatch_errors: usize,
    pub isolated_failures: usize,
}

/// Feeds notifications from an [`EventSource`] to a dispatcher, one at a time.
pub struct NotificationSession<'d, S> {
    dispatcher: &'d NotificationDispatcher,
    source: S,
    options: SessionOptions,
    summary: SessionSummary,
}

impl<'d, S: EventSource> NotificationSession<'d, S> {
    pub fn new(dispatcher: &'d NotificationDispatcher, source: S) -> Self {
        Self {
            dispatcher,
            source,
            options: SessionOptions::default(),
            summary: SessionSummary::default(),
        }
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Processes records until the source is exhausted.
    pub fn run(&mut self) -> Result<SessionSummary, SessionError> {
        while let Some(record) = self.source.next_record() {
            self.process_record(record)?;
        }
        info!(
            records = self.summary.records,
            notifications = self.summary.notifications,
            dispatch_errors = self.summary.dispatch_errors,
            "Notification source exhausted"
        );
        Ok(self.summary)
    }

    /// Dispatches every notification in `record`.
    pub fn process_record(&mut self, record: EventRecord) -> Result<(), SessionError> {
        self.summary.records += 1;
        let line_number = record.line_number;

        let notifications = match record.outcome {
            Ok(notifications) => notifications,
            Err(err) => {
                self.summary.ingest_errors += 1;
                warn!(line_number, error = %err, raw = ?record.raw, "Skipping unreadable event");
                return Ok(());
            }
        };

        for notification in notifications {
            self.summary.notifications += 1;
            match self.dispatcher.dispatch(&notification) {
                Ok(report) if report.is_noop() => self.summary.skipped += 1,
                Ok(report) => {
                    self.summary.dispatched += 1;
                    self.summary.isolated_failures += report.failures.len();
                    debug!(
                        line_number,
                        command = report.command.as_deref(),
                        steps = report.invoked.len(),
                        "Dispatched notification"
                    );
                }
                Err(source) => {
                    self.summary.dispatch_errors += 1;
                    error!(
                        line_number,
                        id = notification.id(),
                        error = %source,
                        "Dispatch aborted"
                    );
                    if self.options.halt_on_dispatch_error {
                        return Err(SessionError::Halted {
                            line_number,
                            source,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
