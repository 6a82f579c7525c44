// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment variable-based configuration provider implementation.

use serde_json::{Value, json};
use std::collections::HashMap;
use std::env;

use super::ConfigError;
use super::ConfigProvider;

/// Prefix used by [`EnvConfigProvider::default`].
pub const DEFAULT_ENV_PREFIX: &str = "MIRAGE_";

/// Path of the configuration file read by the binary.
pub const CONFIG_PATH_ENV: &str = "MIRAGE_CONFIG_PATH";

/// Inline JSON configuration read by the binary.
pub const CONFIG_STRING_ENV: &str = "MIRAGE_CONFIG_STRING";

/// Log level override read by the loader.
pub const LOG_LEVEL_ENV: &str = "MIRAGE_LOG_LEVEL";

/// Variables that steer startup and are never configuration keys.
const CONTROL_VARS: [&str; 3] = [CONFIG_PATH_ENV, CONFIG_STRING_ENV, LOG_LEVEL_ENV];

/// Configuration provider that retrieves values from environment variables.
///
/// `MIRAGE_CLIENT_TIMEOUT=5` becomes the key `client.timeout`.  Values are
/// snapshotted when the provider is created; this is unrelated to the
/// per-call `env:` resolution of upstream URLs.
#[derive(Debug)]
pub struct EnvConfigProvider {
    prefix: String,
    cache: HashMap<String, String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable configuration provider with the specified prefix.
    pub fn new(prefix: &str) -> Self {
        let mut provider = Self {
            prefix: prefix.to_string(),
            cache: HashMap::new(),
        };

        provider.refresh_cache();

        provider
    }

    /// Refresh the cache of environment variables.
    pub fn refresh_cache(&mut self) {
        self.cache.clear();

        for (key, value) in env::vars() {
            if CONTROL_VARS.contains(&key.as_str()) {
                continue;
            }
            if let Some(stripped) = key.strip_prefix(&self.prefix) {
                // MIRAGE_CLIENT_TIMEOUT -> client.timeout
                let config_key = stripped.to_lowercase().replace('_', ".");
                self.cache.insert(config_key, value);
            }
        }
    }

    /// Parse a string value into a JSON Value.
    fn parse_value_to_json(&self, value: &str) -> Result<Value, ConfigError> {
        if let Ok(json_value) = serde_json::from_str(value) {
            return Ok(json_value);
        }

        if value.eq_ignore_ascii_case("true") {
            return Ok(json!(true));
        } else if value.eq_ignore_ascii_case("false") {
            return Ok(json!(false));
        }

        Ok(json!(value))
    }
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        match self.cache.get(key) {
            Some(value) => self.parse_value_to_json(value).map(Some),
            None => Ok(None),
        }
    }

    fn has(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        "env"
    }
}
