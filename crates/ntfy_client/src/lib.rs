#![forbid(unsafe_code)]
//! Command dispatch for the ntfy real-time client.
//!
//! Inbound notifications are routed by the first word of their message:
//! - command functions get the message words and the record,
//! - command parsers get the record,
//! - shell triggers run the whole message through the shell,
//! - shell aliases run a fixed command line,
//! - global parsers get every record regardless of its text.
//!
//! Shell work goes to a bounded [`ProcessPool`]; the provider connection is abstracted as an
//! [`EventSource`] driven by [`NotificationSession`].

mod builder;
mod dispatcher;
mod error;
mod registry;
pub mod rules;
mod session;
pub mod shell;

pub use builder::DispatcherBuilder;
pub use dispatcher::{
    DispatchReport, DispatchStep, FailurePolicy, HandlerErrorSink, NotificationDispatcher,
    StepError, StepFailure,
};
pub use error::{ConfigError, DispatchError, HandlerError, RegistryError, SessionError, ShellError};
pub use registry::{CommandFunction, CommandLine, HandlerResult, NotificationParser, Registries};
pub use rules::DispatchRules;
pub use session::{EventSource, NotificationSession, SessionOptions, SessionSummary};
pub use shell::{ProcessPool, ShellInvocation, ShellLauncher, ShellOutcome, ShellOutcomeSink};

pub use ntfy_events::Notification;
