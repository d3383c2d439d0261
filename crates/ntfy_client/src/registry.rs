use std::{fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use ntfy_events::Notification;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{HandlerError, RegistryError};

pub type HandlerResult = Result<(), HandlerError>;

/// Receives the message words (command first) and the full record.
pub type CommandFunction = Arc<dyn Fn(&[&str], &Notification) -> HandlerResult + Send + Sync>;

/// Receives only the full record.
pub type NotificationParser = Arc<dyn Fn(&Notification) -> HandlerResult + Send + Sync>;

/// Command line bound to a shell alias.
///
/// A `Line` runs through the shell as written; `Argv` runs the first element directly with
/// the remaining elements as its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Line(String),
    Argv(Vec<String>),
}

impl CommandLine {
    pub fn line(line: impl Into<String>) -> Self {
        CommandLine::Line(line.into())
    }

    pub fn argv(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        CommandLine::Argv(args.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Line(line) => line.trim().is_empty(),
            CommandLine::Argv(args) => args.first().map_or(true, |program| program.is_empty()),
        }
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        CommandLine::line(line)
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        CommandLine::Line(line)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(args: Vec<String>) -> Self {
        CommandLine::Argv(args)
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(args: [&str; N]) -> Self {
        CommandLine::argv(args)
    }
}

/// Handler tables consulted by the dispatcher.
///
/// Every table is last-write-wins: registering under an existing key replaces the entry in
/// place, keeping its position in iteration order.
#[derive(Clone, Default)]
pub struct Registries {
    command_functions: IndexMap<String, CommandFunction>,
    command_parsers: IndexMap<String, NotificationParser>,
    global_parsers: IndexMap<String, NotificationParser>,
    shell_commands: IndexSet<String>,
    shell_aliases: IndexMap<String, CommandLine>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `handler` when the first word of a message equals `name`.
    pub fn register_command_function<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> Option<CommandFunction>
    where
        F: Fn(&[&str], &Notification) -> HandlerResult + Send + Sync + 'static,
    {
        self.command_functions.insert(name.into(), Arc::new(handler))
    }

    /// Runs `parser` with the record when the first word of a message equals `name`.
    pub fn register_command_parser<F>(
        &mut self,
        name: impl Into<String>,
        parser: F,
    ) -> Option<NotificationParser>
    where
        F: Fn(&Notification) -> HandlerResult + Send + Sync + 'static,
    {
        self.command_parsers.insert(name.into(), Arc::new(parser))
    }

    /// Runs `parser` for every notification.
    pub fn register_global_parser<F>(
        &mut self,
        name: impl Into<String>,
        parser: F,
    ) -> Option<NotificationParser>
    where
        F: Fn(&Notification) -> HandlerResult + Send + Sync + 'static,
    {
        self.global_parsers.insert(name.into(), Arc::new(parser))
    }

    /// Registers a shell trigger and returns the stored key.
    ///
    /// Only the first word of `trigger` is kept. A matching message is executed verbatim by
    /// the shell, so `"uptime -p"` registers `uptime` and the message decides the arguments.
    pub fn register_shell_command(&mut self, trigger: &str) -> Result<String, RegistryError> {
        let key = first_word(trigger, "shell command")?;
        self.shell_commands.insert(key.clone());
        Ok(key)
    }

    /// Binds a one-word alias to a fixed command line and returns the stored alias.
    ///
    /// Words following the alias in a notification are not forwarded to the command.
    pub fn register_shell_alias(
        &mut self,
        alias: &str,
        command_line: impl Into<CommandLine>,
    ) -> Result<String, RegistryError> {
        let key = first_word(alias, "shell alias")?;
        let command_line = command_line.into();
        if command_line.is_empty() {
            return Err(RegistryError::EmptyCommandLine { alias: key });
        }
        self.shell_aliases.insert(key.clone(), command_line);
        Ok(key)
    }

    pub fn command_function(&self, name: &str) -> Option<&CommandFunction> {
        self.command_functions.get(name)
    }

    pub fn command_parser(&self, name: &str) -> Option<&NotificationParser> {
        self.command_parsers.get(name)
    }

    pub fn is_shell_command(&self, name: &str) -> bool {
        self.shell_commands.contains(name)
    }

    pub fn shell_alias(&self, alias: &str) -> Option<&CommandLine> {
        self.shell_aliases.get(alias)
    }

    /// Global parsers in registration order.
    pub fn global_parsers(&self) -> impl Iterator<Item = (&str, &NotificationParser)> {
        self.global_parsers
            .iter()
            .map(|(name, parser)| (name.as_str(), parser))
    }

    pub fn command_function_names(&self) -> impl Iterator<Item = &str> {
        self.command_functions.keys().map(String::as_str)
    }

    pub fn command_parser_names(&self) -> impl Iterator<Item = &str> {
        self.command_parsers.keys().map(String::as_str)
    }

    pub fn global_parser_names(&self) -> impl Iterator<Item = &str> {
        self.global_parsers.keys().map(String::as_str)
    }

    pub fn shell_commands(&self) -> impl Iterator<Item = &str> {
        self.shell_commands.iter().map(String::as_str)
    }

    pub fn shell_aliases(&self) -> impl Iterator<Item = (&str, &CommandLine)> {
        self.shell_aliases
            .iter()
            .map(|(alias, line)| (alias.as_str(), line))
    }

    pub fn is_empty(&self) -> bool {
        self.command_functions.is_empty()
            && self.command_parsers.is_empty()
            && self.global_parsers.is_empty()
            && self.shell_commands.is_empty()
            && self.shell_aliases.is_empty()
    }
}

impl fmt::Debug for Registries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registries")
            .field("command_functions", &self.command_functions.keys())
            .field("command_parsers", &self.command_parsers.keys())
            .field("global_parsers", &self.global_parsers.keys())
            .field("shell_commands", &self.shell_commands)
            .field("shell_aliases", &self.shell_aliases)
            .finish()
    }
}

fn first_word(input: &str, kind: &'static str) -> Result<String, RegistryError> {
    let mut words = input.split_whitespace();
    let Some(first) = words.next() else {
        return Err(RegistryError::BlankTrigger { kind });
    };
    if words.next().is_some() {
        warn!(
            kind,
            input,
            registered = first,
            "Only the first word of a trigger is registered; trailing words are ignored"
        );
    }
    Ok(first.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn last_registration_wins_and_keeps_position() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registries = Registries::new();

        registries.register_global_parser("audit", |_| Err("stale handler".into()));
        registries.register_global_parser("forward", |_| Ok(()));
        let counter = Arc::clone(&hits);
        let replaced = registries.register_global_parser("audit", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(replaced.is_some());

        let names: Vec<_> = registries.global_parser_names().collect();
        assert_eq!(names, vec!["audit", "forward"]);

        let (_, audit) = registries.global_parsers().next().unwrap();
        audit(&Notification::empty()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shell_trigger_keeps_first_word_only() {
        let mut registries = Registries::new();
        let key = registries.register_shell_command("uptime -p").unwrap();
        assert_eq!(key, "uptime");
        assert!(registries.is_shell_command("uptime"));
        assert!(!registries.is_shell_command("uptime -p"));
    }

    #[test]
    fn blank_triggers_and_empty_alias_lines_are_rejected() {
        let mut registries = Registries::new();
        assert_eq!(
            registries.register_shell_command("   "),
            Err(RegistryError::BlankTrigger {
                kind: "shell command"
            })
        );
        assert_eq!(
            registries.register_shell_alias("deploy", CommandLine::Argv(Vec::new())),
            Err(RegistryError::EmptyCommandLine {
                alias: "deploy".to_string()
            })
        );
        assert!(registries.is_empty());
    }

    #[test]
    fn alias_accepts_both_command_line_forms() {
        let mut registries = Registries::new();
        registries
            .register_shell_alias("deploy now", ["ssh", "host", "run-deploy"])
            .unwrap();
        registries
            .register_shell_alias("status", "systemctl status nginx")
            .unwrap();

        assert_eq!(
            registries.shell_alias("deploy"),
            Some(&CommandLine::argv(["ssh", "host", "run-deploy"]))
        );
        assert_eq!(
            registries.shell_alias("status"),
            Some(&CommandLine::line("systemctl status nginx"))
        );
    }
}
