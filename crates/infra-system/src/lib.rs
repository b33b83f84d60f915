// Asset Filter Infrastructure - System Adapters
// Implements: ProcessRunner, ArtifactFactory

pub mod artifact_factory;
pub mod process_runner;

pub use artifact_factory::ScratchDirArtifactFactory;
pub use process_runner::TokioProcessRunner;
