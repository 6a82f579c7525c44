// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Route table – declarative routes and their compiled form.
//!
//! Routes are read from the `routes` configuration key as [`RouteConfig`]s
//! and compiled once into immutable [`Route`]s.  Compilation parses header
//! maps, validates status codes and rejects duplicate `(method, path)`
//! identities, so nothing of that kind can fail while serving.
//!
//! ### Path matching
//! | pattern    | matches                              |
//! |------------|--------------------------------------|
//! | `/test`    | exactly `/test`                      |
//! | `/static/` | `/static/` and everything beneath it |
//!
//! Longest pattern wins.  When several routes share a path, the one whose
//! method matches is returned; otherwise the first one declared, which then
//! answers 405.


use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compose::ResponseTemplate;
use crate::config::{Config, ConfigError};
use crate::core::HttpMethod;
use crate::upstream::Upstream;

/// A body literal, typed once at load time from its JSON shape.
///
/// A string is text; an object is a flat JSON object template.  Any other
/// shape is rejected when the configuration is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Text(String),
    Object(Map<String, Value>),
}

/// Configuration for a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Name of the route (for logging and reference)
    pub name: String,
    /// Path pattern this route answers on
    pub path: String,
    /// The only method this route accepts
    pub method: HttpMethod,
    /// Upstream calls, issued in this order
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
    /// Response recipe
    #[serde(default)]
    pub response: ResponseConfig,
}

/// Configuration for an upstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Target URL, or `env:NAME` to read it from the environment per call
    pub url: String,
    /// Copy the inbound request headers onto the call first
    #[serde(default)]
    pub include_request_headers: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Case-insensitive verb; empty means GET
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub body: Option<Body>,
}

/// Configuration for a route's response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub body: Option<Body>,
    #[serde(
        default,
        rename = "concat_upstream_responses",
        alias = "include_upstream_responses"
    )]
    pub include_upstream_responses: bool,
    #[serde(default)]
    pub include_request_information: bool,
}

fn default_status_code() -> u16 {
    200
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            status_code: default_status_code(),
            body: None,
            include_upstream_responses: false,
            include_request_information: false,
        }
    }
}

/// A compiled, immutable route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub path: String,
    pub method: HttpMethod,
    pub upstreams: Vec<Upstream>,
    pub response: ResponseTemplate,
}

impl Route {
    /// Compile a route declaration.
    pub fn compile(config: RouteConfig) -> Result<Self, ConfigError> {
        let name = config.name;

        if !config.path.starts_with('/') {
            return Err(ConfigError::invalid_route(
                &name,
                format!("path '{}' must start with '/'", config.path),
            ));
        }

        let upstreams = config
            .upstreams
            .into_iter()
            .map(|upstream| {
                Ok(Upstream {
                    headers: header_map(&name, &upstream.headers)?,
                    url: upstream.url,
                    method: upstream.method,
                    body: upstream.body,
                    include_request_headers: upstream.include_request_headers,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let response = config.response;
        let status = StatusCode::from_u16(response.status_code).map_err(|_| {
            ConfigError::invalid_route(
                &name,
                format!("invalid status code {}", response.status_code),
            )
        })?;

        Ok(Self {
            response: ResponseTemplate {
                headers: header_map(&name, &response.headers)?,
                status,
                body: response.body,
                include_upstream_responses: response.include_upstream_responses,
                include_request_information: response.include_request_information,
            },
            name,
            path: config.path,
            method: config.method,
            upstreams,
        })
    }

    /// Returns true if this route's path pattern covers `path`.
    pub fn matches_path(&self, path: &str) -> bool {
        if self.path == path {
            return true;
        }
        self.path.ends_with('/') && path.starts_with(&self.path)
    }
}

fn header_map(route: &str, headers: &HashMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::invalid_route(route, format!("invalid header name '{name}': {e}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::invalid_route(route, format!("invalid value for header '{name}': {e}"))
        })?;
        if map.contains_key(&header_name) {
            return Err(ConfigError::invalid_route(
                route,
                format!("header '{name}' is declared more than once"),
            ));
        }
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// The compiled set of routes, shared read-only by every request.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    /// Compile route declarations, rejecting duplicate `(method, path)` pairs.
    pub fn from_configs(configs: Vec<RouteConfig>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(configs.len());

        for config in configs {
            let route = Route::compile(config)?;
            if !seen.insert((route.method, route.path.clone())) {
                return Err(ConfigError::DuplicateRoute {
                    method: route.method.to_string(),
                    path: route.path,
                });
            }
            log::info!("adding route {} ({} {})", route.name, route.method, route.path);
            routes.push(Arc::new(route));
        }

        Ok(Self { routes })
    }

    /// Read and compile the `routes` key.  A missing key is an empty table.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let configs: Vec<RouteConfig> = config.get_or_default("routes", Vec::new())?;
        Self::from_configs(configs)
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route that should handle `method path`, if any path matches.
    pub fn lookup(&self, path: &str, method: &Method) -> Option<&Arc<Route>> {
        let candidates: Vec<&Arc<Route>> = self
            .routes
            .iter()
            .filter(|route| route.matches_path(path))
            .collect();

        let longest = candidates.iter().map(|route| route.path.len()).max()?;
        let mut best = candidates
            .into_iter()
            .filter(|route| route.path.len() == longest);

        let first = best.next()?;
        if first.method.matches(method) {
            return Some(first);
        }
        Some(best.find(|route| route.method.matches(method)).unwrap_or(first))
    }
}
