// Process Runner Port
// Abstraction for launching an external build tool and capturing its output

use crate::domain::{ProcessRequest, ProcessResult};
use async_trait::async_trait;
use thiserror::Error;

/// Process runner errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process timeout after {0}ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Process Runner trait
///
/// Implementations must drain stdout and stderr concurrently so a child
/// filling one pipe cannot block on the other.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the request to completion and capture its output
    ///
    /// A non-zero exit is NOT an error here; callers classify the result.
    ///
    /// # Errors
    /// - ProcessError::SpawnFailed if the program cannot be started
    /// - ProcessError::Timeout if the request deadline elapsed (child is killed)
    /// - ProcessError::IoError if waiting on the child failed
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessResult, ProcessError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::artifact_factory::mocks::InMemoryArtifacts;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Mock runner behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit with the given code, optionally "writing" the `out=` artifact
        Exit {
            exit_code: i32,
            stdout: Vec<u8>,
            stderr: Vec<u8>,
            output: Option<Vec<u8>>,
        },
        /// Program could not be started
        SpawnFail(String),
        /// Deadline elapsed
        Timeout(u64),
        /// Waiting on the child failed
        IoError(String),
    }

    /// Scripted runner that records every request it receives
    pub struct ScriptedProcessRunner {
        behavior: MockBehavior,
        artifacts: Option<Arc<InMemoryArtifacts>>,
        requests: Mutex<Vec<ProcessRequest>>,
    }

    impl ScriptedProcessRunner {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                artifacts: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Exit 0 after writing `output` to the `out=` path in `artifacts`
        pub fn new_writing(output: impl Into<Vec<u8>>, artifacts: Arc<InMemoryArtifacts>) -> Self {
            Self::new(MockBehavior::Exit {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
                output: Some(output.into()),
            })
            .with_artifacts(artifacts)
        }

        pub fn new_exit(exit_code: i32, stdout: &str, stderr: &str) -> Self {
            Self::new(MockBehavior::Exit {
                exit_code,
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
                output: None,
            })
        }

        pub fn new_spawn_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::SpawnFail(message.into()))
        }

        pub fn with_artifacts(mut self, artifacts: Arc<InMemoryArtifacts>) -> Self {
            self.artifacts = Some(artifacts);
            self
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<ProcessRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn output_path(request: &ProcessRequest) -> Option<PathBuf> {
            request
                .args
                .iter()
                .rev()
                .find_map(|arg| arg.strip_prefix("out=").map(PathBuf::from))
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedProcessRunner {
        async fn run(&self, request: &ProcessRequest) -> Result<ProcessResult, ProcessError> {
            self.requests.lock().unwrap().push(request.clone());

            match &self.behavior {
                MockBehavior::Exit {
                    exit_code,
                    stdout,
                    stderr,
                    output,
                } => {
                    if let (Some(bytes), Some(artifacts), Some(path)) =
                        (output, &self.artifacts, Self::output_path(request))
                    {
                        artifacts.write(&path, bytes);
                    }
                    Ok(ProcessResult {
                        stdout: stdout.clone(),
                        stderr: stderr.clone(),
                        exit_code: *exit_code,
                        duration_ms: 1,
                    })
                }
                MockBehavior::SpawnFail(msg) => Err(ProcessError::SpawnFailed(msg.clone())),
                MockBehavior::Timeout(ms) => Err(ProcessError::Timeout(*ms)),
                MockBehavior::IoError(msg) => Err(ProcessError::IoError(msg.clone())),
            }
        }
    }
}
