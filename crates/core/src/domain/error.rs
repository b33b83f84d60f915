// Domain Error Types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid invocation phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Structured filter failure surfaced to the pipeline
///
/// Every variant carries the tool name so a pipeline running several
/// filters can tell which one failed.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("{tool}: whole-project builds are not implemented (built_main={})", .built_main.display())]
    UnsupportedMode { tool: String, built_main: PathBuf },

    /// Raw stream bytes are kept; only the message decodes them
    #[error(
        "{tool}: subprocess had error: stderr={}, stdout={}, returncode={exit_code}",
        String::from_utf8_lossy(.stderr),
        String::from_utf8_lossy(.stdout)
    )]
    ToolExecution {
        tool: String,
        stderr: Vec<u8>,
        stdout: Vec<u8>,
        exit_code: i32,
    },

    #[error("{tool}: failed to launch '{binary}': {reason}")]
    ToolLaunch {
        tool: String,
        binary: String,
        reason: String,
    },

    #[error("{tool}: cannot read build output {}: {reason}", .path.display())]
    ArtifactRead {
        tool: String,
        path: PathBuf,
        reason: String,
    },

    #[error("{tool}: cannot allocate temporary output: {reason}")]
    ArtifactAllocation { tool: String, reason: String },

    #[error("{tool}: subprocess timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("{tool}: subprocess I/O failed: {reason}")]
    Io { tool: String, reason: String },
}

impl FilterError {
    /// Name of the tool whose invocation failed
    pub fn tool(&self) -> &str {
        match self {
            FilterError::UnsupportedMode { tool, .. }
            | FilterError::ToolExecution { tool, .. }
            | FilterError::ToolLaunch { tool, .. }
            | FilterError::ArtifactRead { tool, .. }
            | FilterError::ArtifactAllocation { tool, .. }
            | FilterError::Timeout { tool, .. }
            | FilterError::Io { tool, .. } => tool,
        }
    }
}
