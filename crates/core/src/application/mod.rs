// Application Layer - Filter execution use cases

pub mod artifact;
pub mod filter;
pub mod tool;

// Re-exports
pub use artifact::TemporaryArtifact;
pub use filter::{ExternalProcessFilter, Filter, FilterReport};
pub use tool::{ExternalTool, RequireJs};
