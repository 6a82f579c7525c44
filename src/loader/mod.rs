// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level entry-point – "turn the key and go".
//!
//! The [`MirageLoader`] assembles the layered configuration, initializes
//! logging, compiles the route table and wires the upstream invoker and the
//! response composer into a [`MirageServer`].
//!
//! Providers are stacked in this order, later ones winning:
//! configuration file, inline document, custom providers, environment.


use std::env;
use std::sync::Arc;

use thiserror::Error;

use crate::compose::{FileReader, FsFileReader, ResponseComposer};
use crate::config::{
    Config, ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider,
    InlineConfigProvider, LOG_LEVEL_ENV,
};
use crate::core::MirageError;
use crate::dispatch::RequestDispatcher;
use crate::info_fmt;
use crate::logging::config::{LoggingConfig, parse_level};
use crate::logging::{RequestLogger, init_with_config};
use crate::route::RouteTable;
use crate::server::{MirageServer, ServerConfig};
use crate::upstream::{EnvLookup, UpstreamInvoker};

/// Errors that can occur during Mirage initialization.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Service error
    #[error("service error: {0}")]
    MirageError(#[from] MirageError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Builder for initializing and configuring Mirage.
#[derive(Debug, Default)]
pub struct MirageLoader {
    config: Option<Config>,
    config_file_path: Option<String>,
    config_string: Option<String>,
    providers: Vec<Arc<dyn ConfigProvider>>,
    use_env_vars: bool,
    env_prefix: Option<String>,
    env_lookup: Option<Arc<dyn EnvLookup>>,
    file_reader: Option<Arc<dyn FileReader>>,
}

impl MirageLoader {
    /// Create a new loader with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a ready-made configuration; file, inline, provider and
    /// environment settings are then ignored.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a configuration file to load.
    pub fn with_config_file(mut self, file_path: &str) -> Self {
        self.config_file_path = Some(file_path.to_string());
        self
    }

    /// Set an inline JSON configuration document.
    pub fn with_config_string(mut self, content: &str) -> Self {
        self.config_string = Some(content.to_string());
        self
    }

    /// Enable environment variable configuration.
    pub fn with_env_vars(mut self) -> Self {
        self.use_env_vars = true;
        self
    }

    /// Set a custom prefix for environment variables (default is "MIRAGE_").
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.use_env_vars = true;
        self
    }

    /// Add a custom configuration provider.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Resolve `env:` upstream URLs through `env_lookup`.
    pub fn with_env_lookup(mut self, env_lookup: Arc<dyn EnvLookup>) -> Self {
        self.env_lookup = Some(env_lookup);
        self
    }

    /// Read `file:` bodies through `file_reader`.
    pub fn with_file_reader(mut self, file_reader: Arc<dyn FileReader>) -> Self {
        self.file_reader = Some(file_reader);
        self
    }

    fn build_config(&mut self) -> Result<Config, LoaderError> {
        if let Some(config) = self.config.take() {
            return Ok(config);
        }

        let mut config_builder = Config::builder();

        if let Some(file_path) = &self.config_file_path {
            config_builder = config_builder.with_provider(FileConfigProvider::new(file_path)?);
        }

        if let Some(content) = &self.config_string {
            config_builder = config_builder.with_provider(InlineConfigProvider::new(content)?);
        }

        for provider in self.providers.drain(..) {
            config_builder = config_builder.with_shared_provider(provider);
        }

        if self.use_env_vars {
            let env_provider = match &self.env_prefix {
                Some(prefix) => EnvConfigProvider::new(prefix),
                None => EnvConfigProvider::default(),
            };
            config_builder = config_builder.with_provider(env_provider);
        }

        Ok(config_builder.build())
    }

    /// Build and initialize Mirage.
    pub async fn build(mut self) -> Result<Mirage, LoaderError> {
        let config = Arc::new(self.build_config()?);

        // Logging first so route loading is visible
        let logging_config: LoggingConfig =
            config.get_or_default("logging", LoggingConfig::default())?;
        let log_level = env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|level| parse_level(&level))
            .unwrap_or_else(|| logging_config.level_filter());
        init_with_config(log_level, &logging_config);

        info_fmt!("Startup", "Mirage starting up");

        let routes = Arc::new(RouteTable::from_config(&config)?);

        let mut invoker = UpstreamInvoker::from_config(&config)?;
        if let Some(env_lookup) = self.env_lookup {
            invoker = invoker.with_env_lookup(env_lookup);
        }

        let file_reader = self
            .file_reader
            .unwrap_or_else(|| Arc::new(FsFileReader));
        let composer = ResponseComposer::new(file_reader);

        let dispatcher = RequestDispatcher::new(Arc::new(invoker), Arc::new(composer));

        let server_config = ServerConfig::from_config(&config)?;
        let server = MirageServer::new(server_config, routes, Arc::new(dispatcher))
            .with_request_logger(RequestLogger::new(logging_config));

        Ok(Mirage { config, server })
    }
}

/// A fully wired Mirage service.
#[derive(Debug, Clone)]
pub struct Mirage {
    config: Arc<Config>,
    server: MirageServer,
}

impl Mirage {
    /// Create a new loader for initializing Mirage.
    pub fn loader() -> MirageLoader {
        MirageLoader::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The compiled routes.
    pub fn routes(&self) -> &RouteTable {
        self.server.routes()
    }

    /// The HTTP server.
    pub fn server(&self) -> &MirageServer {
        &self.server
    }

    /// Start the server and run until shutdown.
    pub async fn start(&self) -> Result<(), LoaderError> {
        self.server.start().await.map_err(LoaderError::MirageError)
    }
}
