// Port Layer - Interfaces for external dependencies

pub mod artifact_factory;
pub mod id_provider; // For deterministic testing
pub mod process_runner;
pub mod time_provider;

// Re-exports
pub use artifact_factory::ArtifactFactory;
pub use id_provider::IdProvider;
pub use process_runner::{ProcessError, ProcessRunner};
pub use time_provider::TimeProvider;
