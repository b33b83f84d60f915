// Tokio process runner
// reason: tokio::process drains stdout and stderr concurrently in wait_with_output
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info};

use assetfilter_core::domain::{ProcessRequest, ProcessResult};
use assetfilter_core::port::{ProcessError, ProcessRunner, TimeProvider};

/// Process runner backed by `tokio::process`
///
/// stdin, stdout and stderr are all piped. The request's stdin bytes are
/// written from a separate task and the pipe is then closed, while both
/// output pipes are drained together, so no pipe can fill up and stall
/// the child. The child is killed if the run future is dropped or the
/// request deadline elapses.
pub struct TokioProcessRunner {
    time_provider: Arc<dyn TimeProvider>,
}

impl TokioProcessRunner {
    /// Create a new process runner
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }

    fn spawn(&self, request: &ProcessRequest) -> Result<Child, ProcessError> {
        Command::new(&request.program)
            .args(&request.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProcessError::SpawnFailed(format!("{}: {}", request.program.display(), e))
            })
    }

    /// Feed stdin from its own task so a child that never reads it cannot block us
    fn feed_stdin(child: &mut Child, payload: Vec<u8>) -> Option<tokio::task::JoinHandle<()>> {
        let mut stdin = child.stdin.take()?;
        Some(tokio::spawn(async move {
            if !payload.is_empty() {
                if let Err(e) = stdin.write_all(&payload).await {
                    // Broken pipe just means the tool ignores stdin
                    debug!(error = %e, "Child stdin closed early");
                }
            }
            drop(stdin);
        }))
    }

    async fn wait(child: Child, timeout_ms: Option<u64>) -> Result<std::process::Output, ProcessError> {
        match timeout_ms {
            Some(timeout_ms_val) => {
                match timeout(Duration::from_millis(timeout_ms_val), child.wait_with_output()).await
                {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(ProcessError::IoError(e.to_string())),
                    // Dropping the wait future drops the child, which kills it
                    Err(_) => Err(ProcessError::Timeout(timeout_ms_val)),
                }
            }
            None => child
                .wait_with_output()
                .await
                .map_err(|e| ProcessError::IoError(e.to_string())),
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessResult, ProcessError> {
        let start_time = self.time_provider.now_millis();

        info!(
            program = %request.program.display(),
            args = ?request.args,
            timeout_ms = ?request.timeout_ms,
            "Starting subprocess execution"
        );

        let mut child = self.spawn(request)?;
        let pid = child.id();
        let stdin_task = Self::feed_stdin(&mut child, request.stdin.clone());

        let output = Self::wait(child, request.timeout_ms).await;

        if let Some(task) = stdin_task {
            // The child is gone, so unwritten stdin has no reader left. A
            // grandchild holding the pipe open must not outlast the deadline.
            task.abort();
            let _ = task.await;
        }
        let output = output?;

        let result = ProcessResult {
            exit_code: exit_code_of(&output.status),
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms: self.time_provider.now_millis() - start_time,
        };

        info!(
            pid = ?pid,
            duration_ms = %result.duration_ms,
            exit_code = %result.exit_code,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            "Subprocess execution completed"
        );

        Ok(result)
    }
}

/// Integer exit code; negated signal number when the child was killed by one
fn exit_code_of(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}
