// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File-based configuration provider implementation.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;
use super::ConfigProvider;

/// Supported file formats for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// JSON format (.json)
    Json,
    /// TOML format (.toml)
    Toml,
    /// YAML format (.yaml, .yml)
    Yaml,
}

impl FileFormat {
    /// Detect the file format from the file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension().and_then(|ext| {
            let ext_str = ext.to_string_lossy().to_lowercase();
            match ext_str.as_str() {
                "json" => Some(FileFormat::Json),
                "toml" => Some(FileFormat::Toml),
                "yaml" | "yml" => Some(FileFormat::Yaml),
                _ => None,
            }
        })
    }
}

/// File-based configuration provider.
#[derive(Debug)]
pub struct FileConfigProvider {
    path: PathBuf,
    data: HashMap<String, Value>,
}

impl FileConfigProvider {
    /// Create a new file-based configuration provider.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let path_buf = PathBuf::from(path);
        let format = FileFormat::from_extension(&path_buf)
            .ok_or_else(|| ConfigError::provider_error("file", "unsupported file format"))?;

        let content = fs::read_to_string(&path_buf).map_err(|e| {
            ConfigError::provider_error("file", format!("failed to read {path}: {e}"))
        })?;
        let data = parse_document(&content, format, "file")?;

        Ok(Self {
            path: path_buf,
            data,
        })
    }

    /// Path the configuration was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn has(&self, key: &str) -> bool {
        lookup(&self.data, key).is_some()
    }

    fn provider_name(&self) -> &str {
        "file"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(lookup(&self.data, key).cloned())
    }
}

/// Parse a whole configuration document into its top-level keys.
///
/// TOML and YAML are converted to `serde_json::Value` for a unified internal
/// representation.  The root must be an object.
pub(super) fn parse_document(
    content: &str,
    format: FileFormat,
    provider: &str,
) -> Result<HashMap<String, Value>, ConfigError> {
    let value = match format {
        FileFormat::Json => serde_json::from_str::<Value>(content)
            .map_err(|e| ConfigError::provider_error(provider, format!("invalid JSON: {e}")))?,
        FileFormat::Toml => {
            let toml_value: toml::Value = toml::from_str(content).map_err(|e| {
                ConfigError::provider_error(provider, format!("invalid TOML: {e}"))
            })?;
            serde_json::to_value(toml_value).map_err(|e| {
                ConfigError::provider_error(provider, format!("failed to convert TOML: {e}"))
            })?
        }
        FileFormat::Yaml => {
            let yaml_value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| {
                ConfigError::provider_error(provider, format!("invalid YAML: {e}"))
            })?;
            serde_json::to_value(yaml_value).map_err(|e| {
                ConfigError::provider_error(provider, format!("failed to convert YAML: {e}"))
            })?
        }
    };

    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(ConfigError::provider_error(
            provider,
            "root configuration must be an object",
        )),
    }
}

/// Get a nested value by a dot-separated key path.
pub(super) fn lookup<'a>(data: &'a HashMap<String, Value>, key_path: &str) -> Option<&'a Value> {
    let mut parts = key_path.split('.');
    let mut current = data.get(parts.next()?)?;

    for part in parts {
        current = current.get(part)?;
    }

    Some(current)
}
