use std::sync::Arc;

use ntfy_events::Notification;

use crate::{
    shell::{DisabledLauncher, ShellLauncher},
    CommandLine, FailurePolicy, HandlerErrorSink, HandlerResult, NotificationDispatcher,
    RegistryError, Registries,
};

/// Assembles a [`NotificationDispatcher`].
///
/// Registration errors from the shell helpers surface at [`DispatcherBuilder::build`].
pub struct DispatcherBuilder {
    registries: Registries,
    launcher: Arc<dyn ShellLauncher>,
    failure_policy: FailurePolicy,
    error_sink: Option<Arc<dyn HandlerErrorSink>>,
    deferred_error: Option<RegistryError>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            registries: Registries::new(),
            launcher: Arc::new(DisabledLauncher),
            failure_policy: FailurePolicy::default(),
            error_sink: None,
            deferred_error: None,
        }
    }
}

impl DispatcherBuilder {
    pub fn registries(mut self, registries: Registries) -> Self {
        self.registries = registries;
        self
    }

    pub fn command_function<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[&str], &Notification) -> HandlerResult + Send + Sync + 'static,
    {
        self.registries.register_command_function(name, handler);
        self
    }

    pub fn command_parser<F>(mut self, name: impl Into<String>, parser: F) -> Self
    where
        F: Fn(&Notification) -> HandlerResult + Send + Sync + 'static,
    {
        self.registries.register_command_parser(name, parser);
        self
    }

    pub fn global_parser<F>(mut self, name: impl Into<String>, parser: F) -> Self
    where
        F: Fn(&Notification) -> HandlerResult + Send + Sync + 'static,
    {
        self.registries.register_global_parser(name, parser);
        self
    }

    pub fn shell_command(mut self, trigger: &str) -> Self {
        if let Err(err) = self.registries.register_shell_command(trigger) {
            self.deferred_error.get_or_insert(err);
        }
        self
    }

    pub fn shell_alias(mut self, alias: &str, command_line: impl Into<CommandLine>) -> Self {
        if let Err(err) = self.registries.register_shell_alias(alias, command_line) {
            self.deferred_error.get_or_insert(err);
        }
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn ShellLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn error_sink(mut self, sink: Arc<dyn HandlerErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<NotificationDispatcher, RegistryError> {
        if let Some(err) = self.deferred_error {
            return Err(err);
        }
        Ok(NotificationDispatcher {
            registries: self.registries,
            launcher: self.launcher,
            failure_policy: self.failure_policy,
            error_sink: self.error_sink,
        })
    }
}
