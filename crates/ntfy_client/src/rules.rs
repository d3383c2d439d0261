//! TOML rules file: shell triggers, aliases, pool limits and dispatch policy.

use std::{fs, path::Path, path::PathBuf, time::Duration};

use indexmap::IndexMap;
use ntfy_events::{IngestConfig, IngestLimits};
use serde::Deserialize;
use tracing::info;

use crate::{
    shell::{PoolLimits, ProcessPoolBuilder},
    CommandLine, ConfigError, FailurePolicy, Registries, RegistryError,
};

/// Global parser registered when `log_notifications` is on.
pub const LOG_PARSER_NAME: &str = "log_notifications";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchRules {
    pub failure_policy: FailurePolicy,
    pub log_notifications: bool,
    pub shell_commands: Vec<String>,
    pub aliases: IndexMap<String, CommandLine>,
    pub shell: ShellSettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellSettings {
    pub program: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub max_concurrent: usize,
    pub max_pending: usize,
    /// Zero disables the timeout.
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for ShellSettings {
    fn default() -> Self {
        let limits = PoolLimits::default();
        Self {
            program: None,
            working_dir: None,
            max_concurrent: limits.max_concurrent,
            max_pending: limits.max_pending,
            timeout_secs: limits.timeout.map_or(0, |t| t.as_secs()),
            max_output_bytes: limits.max_output_bytes,
        }
    }
}

impl ShellSettings {
    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            max_concurrent: self.max_concurrent,
            max_pending: self.max_pending,
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            max_output_bytes: self.max_output_bytes,
        }
    }

    pub fn pool_builder(&self) -> ProcessPoolBuilder {
        let mut builder = ProcessPoolBuilder::default().limits(self.pool_limits());
        if let Some(program) = self.program.as_ref() {
            builder = builder.shell(program);
        }
        if let Some(dir) = self.working_dir.as_ref() {
            builder = builder.working_dir(dir);
        }
        builder
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestSettings {
    pub max_line_bytes: usize,
    pub capture_raw: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_line_bytes: IngestLimits::default().max_line_bytes,
            capture_raw: false,
        }
    }
}

impl IngestSettings {
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            limits: IngestLimits {
                max_line_bytes: self.max_line_bytes,
            },
            capture_raw: self.capture_raw,
        }
    }
}

impl DispatchRules {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let rules: Self =
            toml::from_str(input).map_err(|source| ConfigError::TomlDecode { source })?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.shell.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "shell.max_concurrent must be at least 1".to_string(),
            ));
        }
        let slots = self
            .shell
            .max_concurrent
            .checked_add(self.shell.max_pending)
            .filter(|slots| *slots <= PoolLimits::max_slots());
        if slots.is_none() {
            return Err(ConfigError::Invalid(format!(
                "shell.max_concurrent + shell.max_pending must not exceed {}",
                PoolLimits::max_slots()
            )));
        }
        if self.ingest.max_line_bytes == 0 {
            return Err(ConfigError::Invalid(
                "ingest.max_line_bytes must be at least 1".to_string(),
            ));
        }
        for trigger in &self.shell_commands {
            if trigger.split_whitespace().next().is_none() {
                return Err(RegistryError::BlankTrigger {
                    kind: "shell command",
                }
                .into());
            }
        }
        for (alias, command_line) in &self.aliases {
            if alias.split_whitespace().next().is_none() {
                return Err(RegistryError::BlankTrigger {
                    kind: "shell alias",
                }
                .into());
            }
            if command_line.is_empty() {
                return Err(RegistryError::EmptyCommandLine {
                    alias: alias.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Registers the configured triggers, aliases and built-in parsers.
    pub fn apply(&self, registries: &mut Registries) -> Result<(), ConfigError> {
        for trigger in &self.shell_commands {
            registries.register_shell_command(trigger)?;
        }
        for (alias, command_line) in &self.aliases {
            registries.register_shell_alias(alias, command_line.clone())?;
        }
        if self.log_notifications {
            registries.register_global_parser(LOG_PARSER_NAME, |notification| {
                info!(
                    id = notification.id(),
                    app = notification.app(),
                    title = notification.title(),
                    text = notification.message(),
                    "Notification received"
                );
                Ok(())
            });
        }
        Ok(())
    }
}
