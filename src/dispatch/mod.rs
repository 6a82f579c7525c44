// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-route request handling.
//!
//! The dispatcher enforces the route's method, runs the upstream calls and
//! hands the survivors to the composer.  A method mismatch answers 405 with
//! an empty body before any upstream is touched.


use std::sync::Arc;

use crate::compose::ResponseComposer;
use crate::core::{ComposedResponse, InboundRequest};
use crate::logging::log_with_context;
use crate::route::Route;
use crate::upstream::UpstreamInvoker;
use crate::{debug_fmt, info_fmt};

/// Drives one request through a route.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    invoker: Arc<UpstreamInvoker>,
    composer: Arc<ResponseComposer>,
}

impl RequestDispatcher {
    pub fn new(invoker: Arc<UpstreamInvoker>, composer: Arc<ResponseComposer>) -> Self {
        Self { invoker, composer }
    }

    /// Handle `request` with `route`.
    pub async fn handle(&self, route: &Route, request: InboundRequest) -> ComposedResponse {
        info_fmt!("Dispatch", "starting to handle request to route {}", route.name);

        if !route.method.matches(&request.method) {
            debug_fmt!(
                "Dispatch",
                "route {} only accepts {}, got {}",
                route.name,
                route.method,
                request.method
            );
            let response = ComposedResponse::method_not_allowed();
            log_done(route, &response);
            return response;
        }

        let retain = route.response.wants_upstreams(&request);
        let upstreams = self
            .invoker
            .invoke(&route.upstreams, &request, retain)
            .await;

        let response = self
            .composer
            .compose(&route.response, &request, &upstreams)
            .await;

        log_done(route, &response);
        response
    }
}

fn log_done(route: &Route, response: &ComposedResponse) {
    log_with_context(
        log::Level::Info,
        "Dispatch",
        &format!("done handling request to route {}", route.name),
        &[
            ("route", route.name.clone()),
            ("status", response.status.as_u16().to_string()),
            ("upstreams", route.upstreams.len().to_string()),
        ],
    );
}
