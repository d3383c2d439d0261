use std::{future::Future, pin::Pin, process::ExitStatus, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    time,
};
use tracing::debug;

use crate::ShellError;

/// Exit status and captured output of a finished process.
///
/// Output beyond the pool's `max_output_bytes` is read and discarded; `truncated` reports it.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub truncated: bool,
}

/// How long output pipes may stay open after the process exits. A backgrounded grandchild
/// keeps them open; whatever was read by then is kept.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

async fn capture_stream<R>(
    mut reader: R,
    captured: &mut Captured,
    max_bytes: usize,
) -> Result<(), std::io::Error>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let room = max_bytes.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }
}

/// Waits for `child` while driving `collect`. Returns the exit status and whether the output
/// was fully collected.
async fn wait_for_exit<F>(
    child: &mut Child,
    mut collect: Pin<&mut F>,
) -> Result<(ExitStatus, bool), ShellError>
where
    F: Future<Output = Result<(), ShellError>>,
{
    tokio::select! {
        status = child.wait() => Ok((status.map_err(ShellError::Wait)?, false)),
        collected = collect.as_mut() => {
            collected?;
            let status = child.wait().await.map_err(ShellError::Wait)?;
            Ok((status, true))
        }
    }
}

pub(crate) async fn spawn_with_retry(
    command: &mut Command,
    program: &str,
) -> Result<tokio::process::Child, ShellError> {
    let mut backoff = Duration::from_millis(2);
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                // ETXTBSY: the program file is still open for writing elsewhere.
                let is_busy = cfg!(unix) && source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    attempt += 1;
                    time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(ShellError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }
    }
}

pub(crate) async fn run_command(
    mut command: Command,
    program: &str,
    timeout: Option<Duration>,
    max_output_bytes: usize,
) -> Result<CommandOutput, ShellError> {
    command.stdin(std::process::Stdio::null());
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());
    command.kill_on_drop(true);

    let mut child = spawn_with_retry(&mut command, program).await?;

    let stdout = child
        .stdout
        .take()
        .ok_or(ShellError::MissingPipe("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(ShellError::MissingPipe("stderr"))?;

    let mut stdout_buf = Captured::default();
    let mut stderr_buf = Captured::default();
    let status = {
        let collect = async {
            tokio::try_join!(
                capture_stream(stdout, &mut stdout_buf, max_output_bytes),
                capture_stream(stderr, &mut stderr_buf, max_output_bytes),
            )
            .map(|_| ())
            .map_err(ShellError::OutputRead)
        };
        tokio::pin!(collect);

        let exited = wait_for_exit(&mut child, collect.as_mut());
        let waited = match timeout {
            Some(dur) => time::timeout(dur, exited).await.map_err(|_| dur),
            None => Ok(exited.await),
        };
        let (status, collected) = match waited {
            Ok(result) => result?,
            Err(dur) => {
                let _ = child.kill().await;
                return Err(ShellError::Timeout { timeout: dur });
            }
        };

        if !collected {
            match time::timeout(OUTPUT_GRACE, collect.as_mut()).await {
                Ok(result) => result?,
                Err(_) => debug!(
                    program,
                    "Output pipes still open after exit; keeping partial output"
                ),
            }
        }
        status
    };

    Ok(CommandOutput {
        status,
        truncated: stdout_buf.truncated || stderr_buf.truncated,
        stdout: stdout_buf.bytes,
        stderr: stderr_buf.bytes,
    })
}
