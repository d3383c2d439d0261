use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::dispatcher::DispatchStep;

/// Error type returned by user handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("shell execution is not configured")]
    Disabled,
    #[error("process pool is saturated ({capacity} running or queued)")]
    Saturated { capacity: usize },
    #[error("failed to spawn shell process (program={program:?}): {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("shell process timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("failed waiting for shell process: {0}")]
    Wait(std::io::Error),
    #[error("failed reading process output: {0}")]
    OutputRead(std::io::Error),
    #[error("internal error: missing {0} pipe")]
    MissingPipe(&'static str),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{step} failed: {source}")]
    Handler {
        step: DispatchStep,
        #[source]
        source: HandlerError,
    },
}

impl DispatchError {
    pub fn step(&self) -> &DispatchStep {
        match self {
            DispatchError::Handler { step, .. } => step,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} trigger must contain at least one word")]
    BlankTrigger { kind: &'static str },
    #[error("alias `{alias}` has an empty command line")]
    EmptyCommandLine { alias: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session halted at line {line_number}: {source}")]
    Halted {
        line_number: usize,
        #[source]
        source: DispatchError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules from `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode rules from TOML: {source}")]
    TomlDecode { source: toml::de::Error },
    #[error("invalid rules: {0}")]
    Invalid(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
