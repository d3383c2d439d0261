use std::{fmt, sync::Arc};

use ntfy_events::Notification;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    shell::{DisabledLauncher, ShellInvocation, ShellLauncher},
    DispatchError, HandlerError, HandlerResult, Registries, ShellError,
};

/// What happens when a handler returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing handler and return the error; later steps do not run.
    #[default]
    AbortOnFirst,
    /// Record the failure, report it to the error sink, and run the remaining steps.
    Isolate,
}

/// One handler invocation or shell submission performed during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStep {
    CommandFunction(String),
    CommandParser(String),
    ShellCommand(String),
    ShellAlias(String),
    GlobalParser(String),
}

impl DispatchStep {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchStep::CommandFunction(_) => "command function",
            DispatchStep::CommandParser(_) => "command parser",
            DispatchStep::ShellCommand(_) => "shell command",
            DispatchStep::ShellAlias(_) => "shell alias",
            DispatchStep::GlobalParser(_) => "global parser",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DispatchStep::CommandFunction(name)
            | DispatchStep::CommandParser(name)
            | DispatchStep::ShellCommand(name)
            | DispatchStep::ShellAlias(name)
            | DispatchStep::GlobalParser(name) => name,
        }
    }
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind(), self.name())
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("handler returned an error: {0}")]
    Handler(#[source] HandlerError),
    #[error("shell launch rejected: {0}")]
    Launch(#[source] ShellError),
}

#[derive(Debug)]
pub struct StepFailure {
    pub step: DispatchStep,
    pub error: StepError,
}

/// Receives failures that did not abort dispatch.
pub trait HandlerErrorSink: Send + Sync {
    fn on_failure(&self, failure: &StepFailure);
}

/// Record of a single dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// First word of the message; `None` when the dispatch was a no-op.
    pub command: Option<String>,
    /// Steps attempted, in order.
    pub invoked: Vec<DispatchStep>,
    /// Failures that were recorded instead of aborting.
    pub failures: Vec<StepFailure>,
}

impl DispatchReport {
    pub fn is_noop(&self) -> bool {
        self.command.is_none()
    }
}

/// Routes notifications to registered handlers.
///
/// For a message whose first word is `cmd` the steps run in a fixed order: the command
/// function `cmd`, the command parser `cmd`, the shell trigger `cmd` (the whole message is
/// run), the shell alias `cmd` (its stored command line is run), then every global parser.
/// A notification without message text is a no-op.
pub struct NotificationDispatcher {
    pub(crate) registries: Registries,
    pub(crate) launcher: Arc<dyn ShellLauncher>,
    pub(crate) failure_policy: FailurePolicy,
    pub(crate) error_sink: Option<Arc<dyn HandlerErrorSink>>,
}

impl NotificationDispatcher {
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            launcher: Arc::new(DisabledLauncher),
            failure_policy: FailurePolicy::default(),
            error_sink: None,
        }
    }

    pub fn builder() -> crate::DispatcherBuilder {
        crate::DispatcherBuilder::default()
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Registration while no dispatch is running; the borrow rules enforce it.
    pub fn registries_mut(&mut self) -> &mut Registries {
        &mut self.registries
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Normalizes a raw event and dispatches it.
    pub fn dispatch_event(
        &self,
        event: Map<String, Value>,
    ) -> Result<DispatchReport, DispatchError> {
        self.dispatch(&Notification::normalize(event))
    }

    pub fn dispatch(&self, notification: &Notification) -> Result<DispatchReport, DispatchError> {
        let Some(message) = notification.message() else {
            debug!(id = notification.id(), "Notification has no message text; skipping");
            return Ok(DispatchReport::default());
        };
        let tokens: Vec<&str> = message.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            debug!(id = notification.id(), "Notification message is blank; skipping");
            return Ok(DispatchReport::default());
        };

        let mut report = DispatchReport {
            command: Some(command.to_string()),
            ..DispatchReport::default()
        };

        if let Some(handler) = self.registries.command_function(command) {
            self.run_handler(
                &mut report,
                DispatchStep::CommandFunction(command.to_string()),
                || handler(tokens.as_slice(), notification),
            )?;
        }

        if let Some(parser) = self.registries.command_parser(command) {
            self.run_handler(
                &mut report,
                DispatchStep::CommandParser(command.to_string()),
                || parser(notification),
            )?;
        }

        if self.registries.is_shell_command(command) {
            self.submit(
                &mut report,
                DispatchStep::ShellCommand(command.to_string()),
                ShellInvocation::line(message),
            );
        }

        if let Some(invocation) = self
            .registries
            .shell_alias(command)
            .and_then(ShellInvocation::from_command_line)
        {
            if tokens.len() > 1 {
                debug!(
                    alias = command,
                    discarded = tokens.len() - 1,
                    "Alias arguments are not forwarded"
                );
            }
            self.submit(
                &mut report,
                DispatchStep::ShellAlias(command.to_string()),
                invocation,
            );
        }

        for (name, parser) in self.registries.global_parsers() {
            self.run_handler(
                &mut report,
                DispatchStep::GlobalParser(name.to_string()),
                || parser(notification),
            )?;
        }

        Ok(report)
    }

    fn run_handler(
        &self,
        report: &mut DispatchReport,
        step: DispatchStep,
        call: impl FnOnce() -> HandlerResult,
    ) -> Result<(), DispatchError> {
        debug!(%step, "Invoking handler");
        report.invoked.push(step.clone());

        let Err(source) = call() else {
            return Ok(());
        };
        match self.failure_policy {
            FailurePolicy::AbortOnFirst => Err(DispatchError::Handler { step, source }),
            FailurePolicy::Isolate => {
                self.record_failure(
                    report,
                    StepFailure {
                        step,
                        error: StepError::Handler(source),
                    },
                );
                Ok(())
            }
        }
    }

    fn submit(&self, report: &mut DispatchReport, step: DispatchStep, invocation: ShellInvocation) {
        debug!(%step, %invocation, "Submitting shell invocation");
        report.invoked.push(step.clone());

        if let Err(error) = self.launcher.launch(invocation) {
            self.record_failure(
                report,
                StepFailure {
                    step,
                    error: StepError::Launch(error),
                },
            );
        }
    }

    fn record_failure(&self, report: &mut DispatchReport, failure: StepFailure) {
        warn!(step = %failure.step, error = %failure.error, "Dispatch step failed; continuing");
        if let Some(sink) = self.error_sink.as_ref() {
            sink.on_failure(&failure);
        }
        report.failures.push(failure);
    }
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("registries", &self.registries)
            .field("failure_policy", &self.failure_policy)
            .field("error_sink", &self.error_sink.is_some())
            .finish_non_exhaustive()
    }
}
