// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives – inbound requests, composed responses & errors.
//!
//! Everything that physically moves between the server, the dispatcher, the
//! upstream invoker and the composer is defined here.  No protocol-level
//! logic lives in this module; that sits in `server` (IO), `upstream`
//! (outbound calls) and `compose` (rendering).

#[cfg(test)]
mod tests;

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-request opt-in header that turns on request information in the
/// composed body, whatever the route's configured default is.
pub const REQUEST_INFO_HEADER: &str = "x-mirage-add-request-headers-in-response";

/// Per-request opt-in header that turns on upstream responses in the
/// composed body, whatever the route's configured default is.
pub const UPSTREAMS_HEADER: &str = "x-mirage-add-upstreams-in-response";

/// Header consulted first when working out the client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Errors that can occur while running the service.
#[derive(Error, Debug)]
pub enum MirageError {
    /// HTTP client error
    #[error("HTTP client error: {0}")]
    ClientError(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<crate::config::error::ConfigError> for MirageError {
    fn from(err: crate::config::error::ConfigError) -> Self {
        MirageError::ConfigError(err.to_string())
    }
}

/// HTTP methods a route can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Trace,
    Connect,
}

impl HttpMethod {
    /// Canonical upper-case verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }

    /// Returns true if `method` is the same verb as this one.
    ///
    /// Extension methods never match a declared route method.
    pub fn matches(&self, method: &Method) -> bool {
        self.as_str() == method.as_str()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "PATCH" => Ok(HttpMethod::Patch),
            "TRACE" => Ok(HttpMethod::Trace),
            "CONNECT" => Ok(HttpMethod::Connect),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Trace => Method::TRACE,
            HttpMethod::Connect => Method::CONNECT,
        }
    }
}

/// An inbound request as seen by the dispatcher.
///
/// The inbound body is never forwarded or rendered, so it is not kept.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path plus query, as received.
    pub uri: String,
    pub headers: HeaderMap,
    /// Transport peer address, if known.
    pub remote_addr: Option<SocketAddr>,
}

impl InboundRequest {
    /// Create a request with no headers and no peer address.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            remote_addr: None,
        }
    }

    /// Path component of the request URI.
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(path, _)| path)
    }

    /// The client address: first non-empty `X-Forwarded-For` value, falling
    /// back to the transport remote address (empty when neither is known).
    pub fn client_ip(&self) -> String {
        self.headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| self.remote_addr.map(|addr| addr.to_string()))
            .unwrap_or_default()
    }

    /// Returns true if the request carries `header` with a non-empty value.
    pub fn opted_in(&self, header: &str) -> bool {
        HeaderName::from_str(header)
            .ok()
            .and_then(|name| self.headers.get(name))
            .is_some_and(|v| !v.is_empty())
    }
}

/// The final status, headers and body written back to the client.
#[derive(Debug, Clone)]
pub struct ComposedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ComposedResponse {
    /// An empty-bodied response with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// 405 with an empty body.
    pub fn method_not_allowed() -> Self {
        Self::empty(StatusCode::METHOD_NOT_ALLOWED)
    }

    /// 404 with an empty body.
    pub fn not_found() -> Self {
        Self::empty(StatusCode::NOT_FOUND)
    }
}
