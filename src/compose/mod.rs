// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response composition.
//!
//! A [`ResponseComposer`] merges a route's [`ResponseTemplate`] with the
//! inbound request and the upstream results that survived, producing the
//! final status, headers and body.
//!
//! The rendering mode follows the template's own `content-type` header:
//! `application/json` renders a JSON object, anything else renders text.
//! Two optional sections can be added to either mode:
//!
//! - **request information**, when the route enables it or the request
//!   carries `x-mirage-add-request-headers-in-response`;
//! - **upstream responses**, when at least one upstream call succeeded and
//!   the route enables it or the request carries
//!   `x-mirage-add-upstreams-in-response`.
//!
//! The opt-in headers can only switch a section on.  Composition never
//! fails the request: a broken template is logged and answered with an
//! empty body and the configured status.


use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::content::{self, FormatError, format_json, format_json_data};
use crate::core::{ComposedResponse, InboundRequest, REQUEST_INFO_HEADER, UPSTREAMS_HEADER};
use crate::route::Body;
use crate::upstream::UpstreamResponse;
use crate::{debug_fmt, warn_fmt};

/// Text body prefix that makes the rest of the value a file path.
pub const FILE_BODY_PREFIX: &str = "file:";

const REQUEST_HEADERS_BANNER: &str =
    "######################\n#   Request headers  #\n######################\n\n";

const UPSTREAM_CALLS_BANNER: &str =
    "\n\n#####################\n#   Upstream calls  #\n#####################\n";

/// Errors raised while rendering a response body.
#[derive(Error, Debug)]
pub enum CompositionError {
    /// A text response was configured with an object body.
    #[error("text response cannot render an object body")]
    ObjectInTextMode,

    /// A JSON response was configured with text that is not JSON.
    #[error("JSON response body is not valid JSON: {0}")]
    TemplateNotJson(#[source] serde_json::Error),

    /// A JSON response was configured with JSON that is not an object.
    #[error("JSON response body must be an object")]
    TemplateNotObject,

    /// A `file:` body could not be read.
    #[error("failed to read body file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The final JSON could not be produced.
    #[error("failed to format response body: {0}")]
    Format(#[from] FormatError),
}

/// Read access to files referenced by `file:` bodies.
#[async_trait]
pub trait FileReader: fmt::Debug + Send + Sync {
    /// Read the whole file at `path` as UTF-8 text.
    async fn read_to_string(&self, path: &str) -> io::Result<String>;
}

/// Reads from the local filesystem on every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFileReader;

#[async_trait]
impl FileReader for FsFileReader {
    async fn read_to_string(&self, path: &str) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

/// A compiled response recipe.  Never mutated after load.
#[derive(Debug, Clone)]
pub struct ResponseTemplate {
    /// Copied verbatim onto every response
    pub headers: HeaderMap,
    pub status: StatusCode,
    pub body: Option<Body>,
    pub include_upstream_responses: bool,
    pub include_request_information: bool,
}

impl ResponseTemplate {
    /// Returns true if this template renders JSON.
    pub fn is_json(&self) -> bool {
        content::is_json(&self.headers)
    }

    /// Whether the request information section is active for `request`.
    pub fn includes_request_information(&self, request: &InboundRequest) -> bool {
        self.include_request_information || request.opted_in(REQUEST_INFO_HEADER)
    }

    /// Whether upstream results are wanted for `request`, before knowing
    /// whether any call succeeds.
    pub fn wants_upstreams(&self, request: &InboundRequest) -> bool {
        self.include_upstream_responses || request.opted_in(UPSTREAMS_HEADER)
    }

    /// Whether the upstream section is active for `request` and `upstreams`.
    pub fn includes_upstreams(
        &self,
        request: &InboundRequest,
        upstreams: &[UpstreamResponse],
    ) -> bool {
        !upstreams.is_empty() && self.wants_upstreams(request)
    }
}

/// Renders response templates.
#[derive(Debug, Clone)]
pub struct ResponseComposer {
    files: Arc<dyn FileReader>,
}

impl Default for ResponseComposer {
    fn default() -> Self {
        Self::new(Arc::new(FsFileReader))
    }
}

impl ResponseComposer {
    pub fn new(files: Arc<dyn FileReader>) -> Self {
        Self { files }
    }

    /// Produce the final response.  A rendering failure is logged and
    /// yields an empty body.
    pub async fn compose(
        &self,
        template: &ResponseTemplate,
        request: &InboundRequest,
        upstreams: &[UpstreamResponse],
    ) -> ComposedResponse {
        let body = match self.render(template, request, upstreams).await {
            Ok(body) => body,
            Err(e) => {
                warn_fmt!("Compose", "failed to compose response body: {}", e);
                Bytes::new()
            }
        };

        ComposedResponse {
            status: template.status,
            headers: template.headers.clone(),
            body,
        }
    }

    /// Render the body only.
    pub async fn render(
        &self,
        template: &ResponseTemplate,
        request: &InboundRequest,
        upstreams: &[UpstreamResponse],
    ) -> Result<Bytes, CompositionError> {
        if template.is_json() {
            self.render_json(template, request, upstreams).await
        } else {
            self.render_text(template, request, upstreams).await
        }
    }

    async fn render_text(
        &self,
        template: &ResponseTemplate,
        request: &InboundRequest,
        upstreams: &[UpstreamResponse],
    ) -> Result<Bytes, CompositionError> {
        let mut out: Vec<u8> = Vec::new();

        if template.includes_request_information(request) {
            out.extend_from_slice(REQUEST_HEADERS_BANNER.as_bytes());
            for name in request.headers.keys() {
                let values: Vec<String> = request
                    .headers
                    .get_all(name)
                    .iter()
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .collect();
                out.extend_from_slice(format!("{}:{}\n", name, values.join(",")).as_bytes());
            }
            out.push(b'\n');
        }

        match &template.body {
            Some(Body::Text(text)) => out.extend_from_slice(self.load_text(text).await?.as_bytes()),
            Some(Body::Object(_)) => return Err(CompositionError::ObjectInTextMode),
            None => {}
        }

        if template.includes_upstreams(request, upstreams) {
            out.extend_from_slice(UPSTREAM_CALLS_BANNER.as_bytes());
            let client_ip = request.client_ip();

            for upstream in upstreams {
                let data = if content::is_json(&upstream.headers) {
                    match format_json_data(&upstream.body) {
                        Ok(data) => data,
                        Err(e) => {
                            debug_fmt!("Compose", "leaving out upstream {}: {}", upstream.url, e);
                            continue;
                        }
                    }
                } else {
                    upstream.body.to_vec()
                };

                out.extend_from_slice(
                    format!(
                        "\n\t{} - {} - {}\n\tFROM {} \n\n\t",
                        upstream.method, upstream.url, upstream.status, client_ip
                    )
                    .as_bytes(),
                );
                // Indent every following line under the block.
                for byte in data {
                    out.push(byte);
                    if byte == b'\n' {
                        out.push(b'\t');
                    }
                }
            }
        }

        Ok(Bytes::from(out))
    }

    async fn render_json(
        &self,
        template: &ResponseTemplate,
        request: &InboundRequest,
        upstreams: &[UpstreamResponse],
    ) -> Result<Bytes, CompositionError> {
        // Work on a copy; the template is shared by every request.
        let mut body = match &template.body {
            Some(Body::Object(map)) => map.clone(),
            Some(Body::Text(text)) => {
                let text = self.load_text(text).await?;
                if text.trim().is_empty() {
                    Map::new()
                } else {
                    match serde_json::from_str::<Value>(&text)
                        .map_err(CompositionError::TemplateNotJson)?
                    {
                        Value::Object(map) => map,
                        _ => return Err(CompositionError::TemplateNotObject),
                    }
                }
            }
            None => Map::new(),
        };

        if template.includes_request_information(request) {
            body.insert(
                "request".to_string(),
                json!({
                    "client_ip": request.client_ip(),
                    "method": request.method.as_str(),
                    "headers": header_values(&request.headers),
                }),
            );
        }

        if template.includes_upstreams(request, upstreams) {
            let entries: Vec<Value> = upstreams.iter().filter_map(upstream_entry).collect();
            body.insert("upstreams".to_string(), Value::Array(entries));
        }

        Ok(Bytes::from(format_json(&body)?))
    }

    /// Resolve a text body, loading `file:` references.
    async fn load_text(&self, text: &str) -> Result<String, CompositionError> {
        match text.strip_prefix(FILE_BODY_PREFIX) {
            Some(path) => self
                .files
                .read_to_string(path)
                .await
                .map_err(|source| CompositionError::File {
                    path: path.to_string(),
                    source,
                }),
            None => Ok(text.to_string()),
        }
    }
}

/// One `upstreams` entry.  A JSON upstream whose body does not decode as an
/// object is left out.
fn upstream_entry(upstream: &UpstreamResponse) -> Option<Value> {
    if !content::is_json(&upstream.headers) {
        return Some(Value::String(
            String::from_utf8_lossy(&upstream.body).into_owned(),
        ));
    }

    match serde_json::from_slice::<Map<String, Value>>(&upstream.body) {
        Ok(body) => Some(json!({
            "url": upstream.url,
            "headers": header_values(&upstream.headers),
            "status_code": upstream.status.as_u16(),
            "body": body,
        })),
        Err(e) => {
            debug_fmt!("Compose", "leaving out upstream {}: {}", upstream.url, e);
            None
        }
    }
}

/// Header map as `name -> [values]`.
fn header_values(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .keys()
        .map(|name| {
            let values = headers
                .get_all(name)
                .iter()
                .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
                .collect();
            (name.as_str().to_string(), Value::Array(values))
        })
        .collect()
}
