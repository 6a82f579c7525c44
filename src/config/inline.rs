// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration provider for a document handed over as a string, typically
//! through the `MIRAGE_CONFIG_STRING` environment variable.

use serde_json::Value;
use std::collections::HashMap;

use super::file::{lookup, parse_document};
use super::{ConfigError, ConfigProvider, FileFormat};

/// Provider backed by an in-memory configuration document.
#[derive(Debug)]
pub struct InlineConfigProvider {
    data: HashMap<String, Value>,
}

impl InlineConfigProvider {
    /// Parse a JSON document.
    pub fn new(content: &str) -> Result<Self, ConfigError> {
        Self::with_format(content, FileFormat::Json)
    }

    /// Parse a document in any supported format.
    pub fn with_format(content: &str, format: FileFormat) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::provider_error("inline", "configuration is empty"));
        }
        let data = parse_document(content, format, "inline")?;
        Ok(Self { data })
    }
}

impl ConfigProvider for InlineConfigProvider {
    fn has(&self, key: &str) -> bool {
        lookup(&self.data, key).is_some()
    }

    fn provider_name(&self) -> &str {
        "inline"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(lookup(&self.data, key).cloned())
    }
}
