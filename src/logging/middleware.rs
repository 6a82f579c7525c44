// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request/response logging with a per-request trace ID.

use crate::core::InboundRequest;
use crate::logging::config::LoggingConfig;
use crate::logging::structured::{RequestInfo, with_request_context};
use reqwest::StatusCode;
use reqwest::header::{HeaderName, USER_AGENT};
use std::sync::Arc;

/// Logs one line when a request arrives and one when its response is ready.
#[derive(Debug, Clone, Default)]
pub struct RequestLogger {
    config: Arc<LoggingConfig>,
}

impl RequestLogger {
    /// Create a new request logger
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Capture request details and log the arrival.
    pub fn begin(&self, request: &InboundRequest) -> RequestInfo {
        let user_agent = request
            .headers
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let mut info = RequestInfo::new(
            request.method.to_string(),
            request.path().to_string(),
            request.client_ip(),
            user_agent,
        );
        if let Some(trace_id) = self.propagated_trace_id(request) {
            info.trace_id = trace_id;
        }

        if crate::logging::is_structured_logging() {
            let logger = with_request_context(&slog_scope::logger(), &info);
            slog::info!(logger, "Request received");
        } else if self.config.include_trace_id {
            log::info!(
                "Request received: {} {} from {} (trace_id: {})",
                info.method,
                info.path,
                info.remote_addr,
                info.trace_id
            );
        } else {
            log::info!(
                "Request received: {} {} from {}",
                info.method,
                info.path,
                info.remote_addr
            );
        }

        info
    }

    /// Log the outcome of a request.
    pub fn finish(&self, info: &RequestInfo, status: StatusCode) {
        let elapsed_ms = info.elapsed_ms();

        if crate::logging::is_structured_logging() {
            let logger = with_request_context(&slog_scope::logger(), info);
            slog::info!(logger, "Response completed";
                "status" => status.as_u16(),
                "elapsed_ms" => elapsed_ms as u64
            );
        } else {
            log::info!(
                "[timing] {} {} -> {} | total={}ms (trace_id: {})",
                info.method,
                info.path,
                status.as_u16(),
                elapsed_ms,
                info.trace_id
            );
        }
    }

    fn propagated_trace_id(&self, request: &InboundRequest) -> Option<String> {
        if !self.config.propagate_trace_id {
            return None;
        }
        let name = HeaderName::from_bytes(self.config.trace_id_header.as_bytes()).ok()?;
        request
            .headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
