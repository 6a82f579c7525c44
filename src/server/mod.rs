// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP server for Mirage.
//!
//! The server is a *thin* wrapper around **hyper-util**.  It owns the
//! listening socket, turns each hyper request into an [`InboundRequest`],
//! finds the route for its path and hands it to the [`RequestDispatcher`].
//! Paths no route covers get `404` with an empty body.
//!
//! **Protocol support**
//! Uses `hyper_util::server::conn::auto::Builder`, so the same
//! connection transparently handles both HTTP/1.1 *and* HTTP/2.
//!
//! ## Shutdown
//! Ctrl-C or SIGTERM stops the accept loop; open connections are asked to
//! close gracefully and given up to 30 seconds to drain.


use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{RwLock, oneshot};
use tokio::task::{Id, JoinSet};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::config::{Config, ConfigError, DEFAULT_PORT, Port};
use crate::core::{ComposedResponse, InboundRequest, MirageError};
use crate::dispatch::RequestDispatcher;
use crate::logging::RequestLogger;
use crate::route::RouteTable;

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "0.0.0.0";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Read the `host` and `port` keys.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let host: String = config.get_or_default("host", DEFAULT_HOST.to_string())?;
        let Port(port) = config.get_or_default("port", Port(DEFAULT_PORT))?;
        Ok(Self { host, port })
    }
}

/// The mock/aggregation HTTP server.
#[derive(Debug, Clone)]
pub struct MirageServer {
    /// Server configuration
    config: ServerConfig,
    /// Compiled routes
    routes: Arc<RouteTable>,
    /// Per-route handling
    dispatcher: Arc<RequestDispatcher>,
    /// Request/response log lines
    request_logger: Arc<RequestLogger>,
    /// Shutdown senders for each connection task
    shutdown_senders: Arc<RwLock<HashMap<Id, oneshot::Sender<()>>>>,
}

impl MirageServer {
    /// Create a new server.
    pub fn new(
        config: ServerConfig,
        routes: Arc<RouteTable>,
        dispatcher: Arc<RequestDispatcher>,
    ) -> Self {
        Self {
            config,
            routes,
            dispatcher,
            request_logger: Arc::new(RequestLogger::default()),
            shutdown_senders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace the request logger.
    pub fn with_request_logger(mut self, request_logger: RequestLogger) -> Self {
        self.request_logger = Arc::new(request_logger);
        self
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The compiled routes.
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, MirageError> {
        let address = (self.config.host.as_str(), self.config.port);
        TcpListener::bind(address).await.map_err(|e| {
            MirageError::Other(format!(
                "failed to bind {}:{}: {}",
                self.config.host, self.config.port, e
            ))
        })
    }

    /// Bind and serve until Ctrl-C or SIGTERM.
    pub async fn start(&self) -> Result<(), MirageError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` completes.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), MirageError>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!(
            "Mirage listening on http://{} with {} route(s)",
            local_addr,
            self.routes.len()
        );

        tokio::pin!(shutdown);

        let shutdown_senders = self.shutdown_senders.clone();
        let mut join_set = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Initiating graceful shutdown");
                    break;
                }
                accept = listener.accept() => {
                    match accept {
                        Ok((stream, remote_addr)) => {
                            let routes = self.routes.clone();
                            let dispatcher = self.dispatcher.clone();
                            let request_logger = self.request_logger.clone();
                            let (tx, rx) = oneshot::channel();
                            let shutdown_senders_clone = shutdown_senders.clone();

                            let handle = join_set.spawn(async move {
                                let task_id = tokio::task::id();

                                let service = service_fn(move |req: Request<Incoming>| {
                                    handle_request(
                                        req,
                                        routes.clone(),
                                        dispatcher.clone(),
                                        request_logger.clone(),
                                        remote_addr,
                                    )
                                });
                                let io = TokioIo::new(stream);

                                let builder = {
                                    let mut b = AutoBuilder::new(TokioExecutor::new());
                                    b.http1();
                                    b.http2();
                                    b
                                };

                                let connection = builder.serve_connection(io, service);
                                let mut conn = std::pin::pin!(connection);

                                tokio::select! {
                                    res = &mut conn => {
                                        if let Err(e) = res {
                                            log_connection_error("Connection error", &*e);
                                        }
                                    }
                                    _ = rx => {
                                        debug!("Connection received shutdown signal, waiting for graceful close");
                                        conn.as_mut().graceful_shutdown();
                                        if let Err(e) = conn.await {
                                            log_connection_error("Connection error during graceful shutdown", &*e);
                                        }
                                    }
                                }

                                shutdown_senders_clone.write().await.remove(&task_id);
                                debug!("Connection task {:?} completed", task_id);
                            });

                            shutdown_senders.write().await.insert(handle.id(), tx);
                        }
                        Err(e) => error!("Accept error: {}", e),
                    }
                }
            }
        }

        // Stop accepting connections and signal existing ones to shut down
        drop(listener);
        {
            let mut senders = shutdown_senders.write().await;
            info!("Signaling {} connection(s) to shut down", senders.len());
            for (_, sender) in senders.drain() {
                let _ = sender.send(());
            }
        }

        let drain = async {
            while let Some(res) = join_set.join_next().await {
                if let Err(e) = res {
                    if !e.is_cancelled() {
                        error!("Connection task failed: {}", e);
                    }
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!(
                "Shutdown timed out after {} seconds, closing remaining connections",
                SHUTDOWN_TIMEOUT.as_secs()
            );
            join_set.shutdown().await;
        }

        info!("Shutdown complete");
        Ok(())
    }
}

/// Completes on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Cannot install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

fn log_connection_error(context: &str, e: &(dyn std::error::Error + Send + Sync)) {
    let message = e.to_string();
    if message.contains("connection closed") || message.contains("connection reset") {
        debug!("{}: {}", context, message);
    } else {
        error!("{}: {}", context, message);
    }
}

/// Convert a hyper request into an [`InboundRequest`], draining its body.
async fn convert_hyper_request(req: Request<Incoming>, remote_addr: SocketAddr) -> InboundRequest {
    let (parts, mut body) = req.into_parts();

    // The inbound body is never used; frames are read and dropped so the
    // connection stays reusable without buffering the body.
    while let Some(frame) = body.frame().await {
        if let Err(e) = frame {
            debug!("Failed to read request body: {}", e);
            break;
        }
    }

    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    InboundRequest {
        method: parts.method,
        uri,
        headers: parts.headers,
        remote_addr: Some(remote_addr),
    }
}

/// Convert a composed response into a hyper response.
fn into_hyper_response(composed: ComposedResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(composed.body));
    *response.status_mut() = composed.status;
    *response.headers_mut() = composed.headers;
    response
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    routes: Arc<RouteTable>,
    dispatcher: Arc<RequestDispatcher>,
    request_logger: Arc<RequestLogger>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let inbound = convert_hyper_request(req, remote_addr).await;
    let info = request_logger.begin(&inbound);

    let composed = match routes.lookup(inbound.path(), &inbound.method) {
        Some(route) => dispatcher.handle(route, inbound).await,
        None => {
            debug!("No route for {} {}", inbound.method, inbound.path());
            ComposedResponse::not_found()
        }
    };

    request_logger.finish(&info, composed.status);
    Ok(into_hyper_response(composed))
}
