// External tool profiles
// Tool-specific argument shapes and settings keys live here

use std::path::Path;

use crate::domain::error::Result;
use crate::domain::{FilterOptions, OptionKeys, Settings};

/// Name used in logs and error messages for the RequireJS optimizer
pub const REQUIREJS_NAME: &str = "requirejs";

/// Fallback executable when `REQUIREJS_BIN` is unset
pub const REQUIREJS_DEFAULT_BINARY: &str = "r.js";

/// Settings keys for the RequireJS filter options
pub const REQUIREJS_OPTION_KEYS: OptionKeys = OptionKeys {
    binary: "REQUIREJS_BIN",
    extra_args: "REQUIREJS_EXTRA_ARGS",
    built_main: "REQUIREJS_BUILT_MAIN",
    timeout_ms: "REQUIREJS_TIMEOUT_MS",
};

/// Description of one wrapped command-line build tool
pub trait ExternalTool: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &str;

    /// Executable launched when no binary override is configured
    fn default_binary(&self) -> &str;

    /// Settings keys the tool's options are read from
    fn option_keys(&self) -> OptionKeys;

    /// Arguments (excluding the binary) for a single-file build that
    /// writes its result to `output_path`
    fn build_args(&self, source_path: &Path, output_path: &Path, extra_args: &[String])
        -> Vec<String>;

    fn resolve_options(&self, settings: &Settings) -> Result<FilterOptions> {
        FilterOptions::resolve(&self.option_keys(), settings)
    }
}

/// RequireJS optimizer (`r.js -o <build config> out=<file>`)
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireJs;

impl ExternalTool for RequireJs {
    fn name(&self) -> &str {
        REQUIREJS_NAME
    }

    fn default_binary(&self) -> &str {
        REQUIREJS_DEFAULT_BINARY
    }

    fn option_keys(&self) -> OptionKeys {
        REQUIREJS_OPTION_KEYS
    }

    fn build_args(
        &self,
        source_path: &Path,
        output_path: &Path,
        extra_args: &[String],
    ) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            source_path.to_string_lossy().into_owned(),
            format!("out={}", output_path.to_string_lossy()),
        ];
        args.extend(strip_output_overrides(extra_args));
        args
    }
}

/// Drop user-supplied `out=` arguments (any case)
///
/// r.js applies the last `out=` it sees, so a user override would
/// silently redirect the build away from the filter's artifact.
pub fn strip_output_overrides(extra_args: &[String]) -> Vec<String> {
    extra_args
        .iter()
        .filter(|arg| !arg.to_ascii_lowercase().starts_with("out="))
        .cloned()
        .collect()
}
