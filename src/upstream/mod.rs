// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Upstream calls.
//!
//! An [`UpstreamInvoker`] walks a route's upstream list strictly in declared
//! order, one call at a time.  A failing call is logged and left out of the
//! results; it never aborts the request.  Every successful response body is
//! read to the end before the next call so pooled connections are released,
//! whether or not the result is kept for composition.


use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use reqwest::header::{
    CONNECTION, CONTENT_LENGTH, HOST, HeaderMap, HeaderName, TRANSFER_ENCODING,
};
use reqwest::{Method, StatusCode};
use thiserror::Error;

use crate::config::Config;
use crate::content;
use crate::core::{InboundRequest, MirageError};
use crate::route::Body;
use crate::{debug_fmt, warn_fmt};

/// URL prefix that makes the rest of the value an environment variable name.
pub const ENV_URL_PREFIX: &str = "env:";

/// Default timeout, in seconds, shared by all upstream calls.
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 30;

// Inbound headers that describe the inbound connection or body and must not
// leak onto a call with a different target and body.
const NON_PROPAGATED_HEADERS: [HeaderName; 4] = [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION];

/// Errors raised by a single upstream call.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The declared method is not a valid HTTP token.
    #[error("invalid upstream method '{0}'")]
    InvalidMethod(String),

    /// The object body could not be encoded as JSON.
    #[error("could not marshal upstream body for {url}: {source}")]
    Serialization {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request could not be built or sent.
    #[error("upstream request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be read to the end.
    #[error("failed to read upstream response from '{url}': {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Read access to environment variables, injected so `env:` URLs can be
/// resolved against something other than the process environment in tests.
pub trait EnvLookup: fmt::Debug + Send + Sync {
    /// Current value of `name`, if set.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment, read on every lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// A compiled upstream declaration.
#[derive(Debug, Clone)]
pub struct Upstream {
    /// Literal URL or `env:NAME`
    pub url: String,
    /// Verb as declared; normalised at call time
    pub method: String,
    pub headers: HeaderMap,
    pub body: Option<Body>,
    pub include_request_headers: bool,
}

impl Upstream {
    /// Resolve the target URL.  `env:NAME` reads `NAME` now; an unset
    /// variable resolves to an empty string.
    pub fn resolve_url(&self, env: &dyn EnvLookup) -> String {
        match self.url.strip_prefix(ENV_URL_PREFIX) {
            Some(name) => env.var(name).unwrap_or_default(),
            None => self.url.clone(),
        }
    }

    /// The declared verb in upper case.  An empty verb means GET.
    pub fn method(&self) -> Result<Method, UpstreamError> {
        let verb = self.method.trim().to_ascii_uppercase();
        if verb.is_empty() {
            return Ok(Method::GET);
        }
        Method::from_bytes(verb.as_bytes()).map_err(|_| UpstreamError::InvalidMethod(verb))
    }

    /// Outbound body for `method`.
    ///
    /// Only POST and PUT carry a body.  An object body is encoded as JSON when
    /// the upstream declares exactly `application/json`; a text body is sent
    /// as is; anything else sends nothing.
    pub fn outbound_body(&self, method: &Method, url: &str) -> Result<Option<Bytes>, UpstreamError> {
        if *method != Method::POST && *method != Method::PUT {
            return Ok(None);
        }

        match &self.body {
            Some(Body::Object(map)) if content::is_json(&self.headers) => serde_json::to_vec(map)
                .map(|data| Some(Bytes::from(data)))
                .map_err(|source| UpstreamError::Serialization {
                    url: url.to_string(),
                    source,
                }),
            Some(Body::Text(text)) => Ok(Some(Bytes::from(text.clone()))),
            _ => Ok(None),
        }
    }

    /// Headers for the outbound call: the inbound headers (every value) when
    /// requested, then the declared headers, which replace any propagated
    /// value of the same name.
    pub fn outbound_headers(&self, inbound: &InboundRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if self.include_request_headers {
            for (name, value) in inbound.headers.iter() {
                if !NON_PROPAGATED_HEADERS.contains(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }

        for (name, value) in self.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        headers
    }
}

/// The captured outcome of a successful upstream call.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub method: Method,
    /// The resolved URL the call was sent to
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Issues a route's upstream calls through one shared HTTP client.
#[derive(Debug, Clone)]
pub struct UpstreamInvoker {
    client: reqwest::Client,
    env: Arc<dyn EnvLookup>,
}

impl UpstreamInvoker {
    pub fn new(client: reqwest::Client, env: Arc<dyn EnvLookup>) -> Self {
        Self { client, env }
    }

    /// Resolve `env:` URLs against `env` instead.
    pub fn with_env_lookup(mut self, env: Arc<dyn EnvLookup>) -> Self {
        self.env = env;
        self
    }

    /// Build an invoker whose client times out after `timeout`, resolving
    /// `env:` URLs against the process environment.
    pub fn with_timeout(timeout: Duration) -> Result<Self, MirageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MirageError::ClientError)?;
        Ok(Self::new(client, Arc::new(ProcessEnv)))
    }

    /// Build an invoker from the `client.timeout` key (seconds).
    pub fn from_config(config: &Config) -> Result<Self, MirageError> {
        let timeout_secs: u64 =
            config.get_or_default("client.timeout", DEFAULT_CLIENT_TIMEOUT_SECS)?;
        Self::with_timeout(Duration::from_secs(timeout_secs))
    }

    /// Perform one upstream call and drain its body.
    pub async fn call(
        &self,
        upstream: &Upstream,
        inbound: &InboundRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = upstream.resolve_url(self.env.as_ref());
        let method = upstream.method()?;
        let body = upstream.outbound_body(&method, &url)?;

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .headers(upstream.outbound_headers(inbound));
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Body {
                url: url.clone(),
                source,
            })?;

        debug_fmt!("Upstream", "{} {} -> {} ({} bytes)", method, url, status, body.len());

        Ok(UpstreamResponse {
            method,
            url,
            status,
            headers,
            body,
        })
    }

    /// Call every upstream in order, one outcome per declaration.
    pub async fn call_all(
        &self,
        upstreams: &[Upstream],
        inbound: &InboundRequest,
    ) -> Vec<Result<UpstreamResponse, UpstreamError>> {
        stream::iter(upstreams)
            .then(|upstream| self.call(upstream, inbound))
            .collect()
            .await
    }

    /// Call every upstream in order and keep the successes when `retain` is
    /// set.  Failures are logged and skipped.
    pub async fn invoke(
        &self,
        upstreams: &[Upstream],
        inbound: &InboundRequest,
        retain: bool,
    ) -> Vec<UpstreamResponse> {
        self.call_all(upstreams, inbound)
            .await
            .into_iter()
            .filter_map(|outcome| match outcome {
                Ok(response) => Some(response),
                Err(e) => {
                    warn_fmt!(
                        "Upstream",
                        "error when performing upstream request {}, skipping to next upstream call",
                        e
                    );
                    None
                }
            })
            .filter(|_| retain)
            .collect()
    }
}
