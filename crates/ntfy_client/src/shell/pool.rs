use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{process::Command, runtime::Handle, sync::Semaphore};
use tracing::{debug, warn};

use super::{process, ShellInvocation, ShellLauncher, ShellOutcome, ShellOutcomeSink};
use crate::ShellError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    /// Processes allowed to run at the same time.
    pub max_concurrent: usize,
    /// Accepted invocations allowed to wait for a free slot.
    pub max_pending: usize,
    /// Wall-clock limit per process; `None` lets processes run until they exit.
    pub timeout: Option<Duration>,
    /// Bytes kept from each of stdout and stderr.
    pub max_output_bytes: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_pending: 64,
            timeout: Some(Duration::from_secs(60)),
            max_output_bytes: 64 * 1024,
        }
    }
}

impl PoolLimits {
    /// Largest `max_concurrent + max_pending` a pool can track.
    pub fn max_slots() -> usize {
        Semaphore::MAX_PERMITS.min(u32::MAX as usize)
    }

    fn capacity(&self) -> usize {
        self.max_concurrent
            .saturating_add(self.max_pending)
            .min(Self::max_slots())
    }

    /// Limits with at least one run slot and a capacity within [`PoolLimits::max_slots`].
    fn clamped(mut self) -> Self {
        let max = Self::max_slots();
        self.max_concurrent = self.max_concurrent.clamp(1, max);
        self.max_pending = self.max_pending.min(max - self.max_concurrent);
        self
    }
}

#[derive(Clone)]
pub struct ProcessPoolBuilder {
    shell: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    limits: PoolLimits,
    sink: Option<Arc<dyn ShellOutcomeSink>>,
}

impl Default for ProcessPoolBuilder {
    fn default() -> Self {
        Self {
            shell: None,
            working_dir: None,
            env: BTreeMap::new(),
            limits: PoolLimits::default(),
            sink: None,
        }
    }
}

impl ProcessPoolBuilder {
    /// Shell used for [`ShellInvocation::Line`]; defaults to `/bin/sh` (`cmd` on Windows).
    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn limits(mut self, limits: PoolLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.limits.max_concurrent = max_concurrent;
        self
    }

    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.limits.max_pending = max_pending;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.limits.timeout = timeout;
        self
    }

    pub fn outcome_sink(mut self, sink: Arc<dyn ShellOutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds a pool whose tasks run on `handle`.
    pub fn build(self, handle: Handle) -> ProcessPool {
        let limits = self.limits.clamped();
        if limits != self.limits {
            warn!(
                requested_concurrent = self.limits.max_concurrent,
                requested_pending = self.limits.max_pending,
                max_concurrent = limits.max_concurrent,
                max_pending = limits.max_pending,
                "Process pool limits clamped"
            );
        }

        ProcessPool {
            handle,
            shell: self.shell.unwrap_or_else(default_shell),
            working_dir: self.working_dir,
            env: Arc::new(self.env),
            slots: Arc::new(Semaphore::new(limits.capacity())),
            running: Arc::new(Semaphore::new(limits.max_concurrent)),
            limits,
            sink: self.sink,
        }
    }
}

/// Bounded executor for shell invocations.
///
/// `launch` never blocks: it claims one of `max_concurrent + max_pending` slots or fails with
/// [`ShellError::Saturated`]. Claimed invocations wait for one of `max_concurrent` run permits.
pub struct ProcessPool {
    handle: Handle,
    shell: PathBuf,
    working_dir: Option<PathBuf>,
    env: Arc<BTreeMap<String, String>>,
    limits: PoolLimits,
    slots: Arc<Semaphore>,
    running: Arc<Semaphore>,
    sink: Option<Arc<dyn ShellOutcomeSink>>,
}

impl ProcessPool {
    pub fn builder() -> ProcessPoolBuilder {
        ProcessPoolBuilder::default()
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Invocations accepted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.limits.capacity() - self.slots.available_permits()
    }

    /// Waits until every accepted invocation has finished.
    pub async fn drain(&self) {
        let all = u32::try_from(self.limits.capacity()).unwrap_or(u32::MAX);
        if let Ok(permits) = self.slots.acquire_many(all).await {
            drop(permits);
        }
    }

    fn command_for(&self, invocation: &ShellInvocation) -> (Command, String) {
        let (mut command, program) = match invocation {
            ShellInvocation::Line(line) => {
                let mut command = Command::new(&self.shell);
                command.arg(shell_flag()).arg(line);
                (command, self.shell.display().to_string())
            }
            ShellInvocation::Argv { program, args } => {
                let mut command = Command::new(program);
                command.args(args);
                (command, program.clone())
            }
        };
        if let Some(dir) = self.working_dir.as_ref() {
            command.current_dir(dir);
        }
        for (key, value) in self.env.iter() {
            command.env(key, value);
        }
        (command, program)
    }
}

impl ShellLauncher for ProcessPool {
    fn launch(&self, invocation: ShellInvocation) -> Result<(), ShellError> {
        let slot = Arc::clone(&self.slots).try_acquire_owned().map_err(|_| {
            ShellError::Saturated {
                capacity: self.limits.capacity(),
            }
        })?;

        let (command, program) = self.command_for(&invocation);
        let running = Arc::clone(&self.running);
        let sink = self.sink.clone();
        let timeout = self.limits.timeout;
        let max_output_bytes = self.limits.max_output_bytes;

        debug!(%invocation, "Queued shell invocation");
        self.handle.spawn(async move {
            let _slot = slot;
            let Ok(_permit) = running.acquire_owned().await else {
                return;
            };

            let started = Instant::now();
            let result = process::run_command(command, &program, timeout, max_output_bytes).await;
            let outcome = ShellOutcome {
                invocation,
                elapsed: started.elapsed(),
                result,
            };
            log_outcome(&outcome);
            if let Some(sink) = sink {
                sink.on_outcome(outcome);
            }
        });
        Ok(())
    }
}

fn log_outcome(outcome: &ShellOutcome) {
    match &outcome.result {
        Ok(output) if output.status.success() => debug!(
            invocation = %outcome.invocation,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Shell invocation finished"
        ),
        Ok(output) => warn!(
            invocation = %outcome.invocation,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Shell invocation exited unsuccessfully"
        ),
        Err(error) => warn!(
            invocation = %outcome.invocation,
            %error,
            "Shell invocation failed"
        ),
    }
}

fn default_shell() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("cmd")
    } else {
        PathBuf::from("/bin/sh")
    }
}

fn shell_flag() -> &'static str {
    if cfg!(windows) {
        "/C"
    } else {
        "-c"
    }
}
