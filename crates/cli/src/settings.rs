//! Settings loading: JSON file first, then environment variables on top

use std::path::Path;

use assetfilter_core::domain::{OptionKeys, Settings};
use assetfilter_core::{AppError, Result};

/// Load settings for a tool from an optional JSON file and the process environment
pub fn load(path: Option<&Path>, keys: &OptionKeys) -> Result<Settings> {
    load_with_vars(path, keys, std::env::vars())
}

/// Same as [`load`] with an explicit variable source
pub fn load_with_vars<I>(path: Option<&Path>, keys: &OptionKeys, vars: I) -> Result<Settings>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut settings = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("cannot read settings file {}: {}", path.display(), e))
            })?;
            Settings::from_json_str(&raw)?
        }
        None => Settings::new(),
    };

    settings.overlay_vars(vars, &keys.all());
    Ok(settings)
}
