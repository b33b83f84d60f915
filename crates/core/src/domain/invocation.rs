// Filter Invocation Domain Model

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::error::{DomainError, Result};

/// Resolved options for one external-tool filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Executable override; the tool's fallback name is used when unset
    pub binary: Option<PathBuf>,

    /// Additional command-line tokens, appended in order
    pub extra_args: Vec<String>,

    /// Main entry point of a whole-project build (unsupported)
    pub built_main: Option<PathBuf>,

    /// Optional deadline for the child process
    pub timeout_ms: Option<u64>,
}

impl FilterOptions {
    /// Whole-project builds scatter outputs across a directory
    pub fn is_whole_project(&self) -> bool {
        self.built_main.is_some()
    }

    /// Binary to launch, falling back to the tool's well-known name
    pub fn binary_or(&self, fallback: &str) -> PathBuf {
        self.binary
            .clone()
            .unwrap_or_else(|| PathBuf::from(fallback))
    }
}

/// Unit of work handed to a filter by the pipeline
#[derive(Debug, Clone)]
pub struct FilterInvocation {
    /// Source content; tools that read a named path leave it unused
    pub input: Vec<u8>,

    /// Build configuration (or source) path passed to the tool
    pub source_path: PathBuf,

    pub options: FilterOptions,
}

impl FilterInvocation {
    pub fn new(source_path: impl Into<PathBuf>, options: FilterOptions) -> Self {
        Self {
            input: Vec::new(),
            source_path: source_path.into(),
            options,
        }
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = input.into();
        self
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

/// Invocation lifecycle
///
/// `Idle -> Launching -> Running -> {Succeeded, Failed}`, plus
/// `Launching -> Failed` when the tool cannot be started and
/// `Idle -> Failed` when the output artifact cannot be allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationPhase {
    Idle,
    Launching,
    Running,
    Succeeded,
    Failed,
}

impl InvocationPhase {
    pub fn can_transition_to(self, next: InvocationPhase) -> bool {
        use InvocationPhase::*;
        matches!(
            (self, next),
            (Idle, Launching)
                | (Idle, Failed)
                | (Launching, Running)
                | (Launching, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvocationPhase::Succeeded | InvocationPhase::Failed)
    }
}

impl std::fmt::Display for InvocationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationPhase::Idle => write!(f, "IDLE"),
            InvocationPhase::Launching => write!(f, "LAUNCHING"),
            InvocationPhase::Running => write!(f, "RUNNING"),
            InvocationPhase::Succeeded => write!(f, "SUCCEEDED"),
            InvocationPhase::Failed => write!(f, "FAILED"),
        }
    }
}

/// Ordered record of the phases one invocation went through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTrail {
    phases: Vec<InvocationPhase>,
}

impl PhaseTrail {
    pub fn new() -> Self {
        Self {
            phases: vec![InvocationPhase::Idle],
        }
    }

    pub fn current(&self) -> InvocationPhase {
        // Never empty: seeded with Idle
        self.phases
            .last()
            .copied()
            .unwrap_or(InvocationPhase::Idle)
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn advance(&mut self, next: InvocationPhase) -> Result<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(DomainError::InvalidPhaseTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        debug!(from = %current, to = %next, "Invocation phase transition");
        self.phases.push(next);
        Ok(())
    }

    pub fn phases(&self) -> &[InvocationPhase] {
        &self.phases
    }
}

impl Default for PhaseTrail {
    fn default() -> Self {
        Self::new()
    }
}
