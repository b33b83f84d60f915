// Domain Layer - Pure filter models and lifecycle rules

pub mod error;
pub mod invocation;
pub mod outcome;
pub mod process;
pub mod settings;

// Re-exports
pub use error::{DomainError, FilterError};
pub use invocation::{FilterInvocation, FilterOptions, InvocationPhase, PhaseTrail};
pub use outcome::{FilterOutcome, UnsupportedMode};
pub use process::{ProcessRequest, ProcessResult};
pub use settings::{OptionKeys, Settings};
