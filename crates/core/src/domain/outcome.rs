// Filter outcome (tagged result handed back to the pipeline)

use std::path::PathBuf;

use crate::domain::error::FilterError;

/// Whole-project build request that the filter declined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMode {
    pub tool: String,
    pub built_main: PathBuf,
}

/// Result of one filter invocation
#[derive(Debug)]
pub enum FilterOutcome {
    /// Full contents of the tool's generated artifact
    Success(Vec<u8>),

    /// The filter declined without launching anything
    Unsupported(UnsupportedMode),

    Failure(FilterError),
}

impl FilterOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FilterOutcome::Success(_))
    }

    /// Collapse into a plain `Result` for callers that only need `?`
    pub fn into_result(self) -> Result<Vec<u8>, FilterError> {
        match self {
            FilterOutcome::Success(bytes) => Ok(bytes),
            FilterOutcome::Unsupported(UnsupportedMode { tool, built_main }) => {
                Err(FilterError::UnsupportedMode { tool, built_main })
            }
            FilterOutcome::Failure(err) => Err(err),
        }
    }
}

impl From<FilterError> for FilterOutcome {
    fn from(err: FilterError) -> Self {
        FilterOutcome::Failure(err)
    }
}
