// Pipeline settings and option resolution

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::error::{DomainError, Result};
use crate::domain::invocation::FilterOptions;

/// Setting keys a tool reads its options from (e.g. `REQUIREJS_BIN`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionKeys {
    pub binary: &'static str,
    pub extra_args: &'static str,
    pub built_main: &'static str,
    pub timeout_ms: &'static str,
}

impl OptionKeys {
    pub fn all(&self) -> [&'static str; 4] {
        [self.binary, self.extra_args, self.built_main, self.timeout_ms]
    }
}

/// Flat key/value settings supplied by the surrounding pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of settings
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| DomainError::ValidationError(format!("Invalid settings JSON: {}", e)))?;

        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(DomainError::ValidationError(format!(
                "Settings must be a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Overlay string variables (e.g. the process environment), restricted to `keys`
    pub fn overlay_vars<I>(&mut self, vars: I, keys: &[&str])
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if keys.contains(&key.as_str()) {
                self.0.insert(key, Value::String(value));
            }
        }
    }

    /// Path-valued setting; missing, null or empty string resolve to `None`
    pub fn get_path(&self, key: &str) -> Result<Option<PathBuf>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(PathBuf::from(s))),
            Some(other) => Err(invalid(key, format!("expected a path, got {}", type_name(other)))),
        }
    }

    /// List-valued setting
    ///
    /// Accepts a JSON array of strings, or a string holding either a JSON
    /// array or whitespace-separated tokens.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => strings_of(key, items),
            Some(Value::String(s)) if s.trim_start().starts_with('[') => {
                let items: Vec<Value> = serde_json::from_str(s)
                    .map_err(|e| invalid(key, format!("malformed JSON list: {}", e)))?;
                strings_of(key, &items)
            }
            Some(Value::String(s)) => Ok(s.split_whitespace().map(str::to_string).collect()),
            Some(other) => Err(invalid(key, format!("expected a list, got {}", type_name(other)))),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(key, format!("expected a non-negative integer, got {}", n))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| invalid(key, format!("'{}' is not an integer: {}", s, e))),
            Some(other) => Err(invalid(key, format!("expected an integer, got {}", type_name(other)))),
        }
    }
}

impl FilterOptions {
    /// Resolve a tool's options from pipeline settings
    pub fn resolve(keys: &OptionKeys, settings: &Settings) -> Result<Self> {
        Ok(Self {
            binary: settings.get_path(keys.binary)?,
            extra_args: settings.get_list(keys.extra_args)?,
            built_main: settings.get_path(keys.built_main)?,
            timeout_ms: settings.get_u64(keys.timeout_ms)?,
        })
    }
}

fn strings_of(key: &str, items: &[Value]) -> Result<Vec<String>> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(invalid(key, format!("list items must be strings, got {}", type_name(other)))),
        })
        .collect()
}

fn invalid(key: &str, reason: String) -> DomainError {
    DomainError::InvalidSetting {
        key: key.to_string(),
        reason,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
