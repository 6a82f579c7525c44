// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mirage - A configuration-driven HTTP mock and aggregation service
//!
//! Mirage answers requests from a declarative route table.  Each route
//! describes a canned response and, optionally, a list of upstream HTTP
//! services to call before answering.  Upstream results and the inbound
//! request's own headers can be folded into the response, either as a
//! plain-text report or merged into a JSON document.
//!
//! # Configuration System
//!
//! - **Multiple Configuration Sources**: Load configuration from files (JSON, TOML, YAML),
//!   inline documents and environment variables.
//! - **Layered Configuration**: Later providers override earlier ones.
//! - **Extensibility**: Implement the `ConfigProvider` trait to create custom configuration sources.
//!
//! # Routes
//!
//! ```json
//! {
//!   "port": 8080,
//!   "routes": [
//!     {
//!       "name": "aggregate",
//!       "method": "GET",
//!       "path": "/aggregate",
//!       "upstreams": [
//!         {"url": "env:USERS_URL", "method": "GET", "headers": {"content-type": "application/json"}}
//!       ],
//!       "response": {
//!         "headers": {"content-type": "application/json"},
//!         "status_code": 200,
//!         "body": {"service": "aggregate"},
//!         "include_upstream_responses": true
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! # Starting the service
//!
//! ```rust,no_run
//! use mirage::Mirage;
//!
//! # async fn run() -> Result<(), mirage::LoaderError> {
//! let mirage = Mirage::loader()
//!     .with_config_file("config.json")
//!     .with_env_vars()
//!     .build()
//!     .await?;
//! mirage.start().await?;
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod compose;
pub mod config;
pub mod content;
pub mod core;
pub mod dispatch;
pub mod loader;
pub mod logging;
pub mod route;
pub mod server;
pub mod upstream;

// Re-export key types at the crate root for convenience
pub use compose::{CompositionError, FileReader, FsFileReader, ResponseComposer, ResponseTemplate};
pub use config::{ConfigError, ConfigProvider, ConfigProviderExt};
pub use content::{ContentKind, FormatError, format_json, format_json_data};
pub use core::{ComposedResponse, HttpMethod, InboundRequest, MirageError};
pub use dispatch::RequestDispatcher;
pub use loader::{LoaderError, Mirage, MirageLoader};
pub use route::{Body, Route, RouteConfig, RouteTable};
pub use server::{MirageServer, ServerConfig};
pub use upstream::{EnvLookup, ProcessEnv, Upstream, UpstreamInvoker, UpstreamResponse};
