//! Shell execution for trigger and alias matches.
//!
//! The dispatcher only decides *what* to run and hands a [`ShellInvocation`] to a
//! [`ShellLauncher`]. [`ProcessPool`] is the production launcher: it bounds how many processes
//! run and wait at once, applies a timeout, and reports each exit through a
//! [`ShellOutcomeSink`].

mod pool;
mod process;

use std::{fmt, time::Duration};

pub use pool::{PoolLimits, ProcessPool, ProcessPoolBuilder};
pub use process::CommandOutput;

use crate::{CommandLine, ShellError};

/// A command the dispatcher wants executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInvocation {
    /// Interpreted by the shell, e.g. `sh -c "<line>"`.
    Line(String),
    /// Executed directly, without a shell.
    Argv { program: String, args: Vec<String> },
}

impl ShellInvocation {
    pub fn line(line: impl Into<String>) -> Self {
        ShellInvocation::Line(line.into())
    }

    /// Converts an alias command line; `None` for an empty argument list.
    pub fn from_command_line(command_line: &CommandLine) -> Option<Self> {
        match command_line {
            CommandLine::Line(line) => Some(ShellInvocation::Line(line.clone())),
            CommandLine::Argv(argv) => {
                let (program, args) = argv.split_first()?;
                Some(ShellInvocation::Argv {
                    program: program.clone(),
                    args: args.to_vec(),
                })
            }
        }
    }
}

impl fmt::Display for ShellInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellInvocation::Line(line) => f.write_str(line),
            ShellInvocation::Argv { program, args } => {
                write!(f, "{program:?}")?;
                for arg in args {
                    write!(f, " {arg:?}")?;
                }
                Ok(())
            }
        }
    }
}

/// Accepts invocations without waiting for them to run.
pub trait ShellLauncher: Send + Sync {
    /// Queues `invocation`. An error means it was never started.
    fn launch(&self, invocation: ShellInvocation) -> Result<(), ShellError>;
}

/// Result of one finished (or failed) invocation.
#[derive(Debug)]
pub struct ShellOutcome {
    pub invocation: ShellInvocation,
    pub elapsed: Duration,
    pub result: Result<CommandOutput, ShellError>,
}

impl ShellOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(output) if output.status.success())
    }
}

pub trait ShellOutcomeSink: Send + Sync + 'static {
    fn on_outcome(&self, outcome: ShellOutcome);
}

/// Launcher that refuses every invocation; the default when no pool is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLauncher;

impl ShellLauncher for DisabledLauncher {
    fn launch(&self, invocation: ShellInvocation) -> Result<(), ShellError> {
        tracing::warn!(%invocation, "No shell launcher configured; dropping invocation");
        Err(ShellError::Disabled)
    }
}
