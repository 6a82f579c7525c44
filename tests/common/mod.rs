// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common test utilities and helpers for Mirage tests.

use mirage::config::{ConfigError, ConfigProvider};
use mirage::{LoaderError, Mirage, MirageError};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Test configuration provider backed by one JSON document
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct TestConfigProvider {
    document: Value,
    name: String,
}

#[allow(dead_code)]
impl TestConfigProvider {
    /// Create a new test config provider from a JSON configuration
    pub fn from_json(document: Value) -> Self {
        Self {
            document,
            name: "test-config".to_string(),
        }
    }

    /// Override a top-level key
    pub fn with_value<T: Into<Value>>(mut self, key: &str, value: T) -> Self {
        if let Value::Object(map) = &mut self.document {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Walk a dot-separated key through the document
    fn get_nested_value(&self, key_path: &str) -> Option<&Value> {
        key_path
            .split('.')
            .try_fold(&self.document, |current, part| current.get(part))
    }
}

impl ConfigProvider for TestConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.get_nested_value(key).is_some()
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.get_nested_value(key).cloned())
    }
}

/// A Mirage instance serving on an ephemeral local port
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), MirageError>>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Absolute URL for `path` on this server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop accepting and wait for the server task to finish
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .expect("server task panicked")
                .expect("server returned an error");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Build Mirage from a JSON document
#[allow(dead_code)]
pub async fn build_mirage(document: Value) -> Result<Mirage, LoaderError> {
    init_test_logging();
    Mirage::loader()
        .with_provider(TestConfigProvider::from_json(document))
        .build()
        .await
}

/// Serve `mirage` on 127.0.0.1 with an OS-assigned port
#[allow(dead_code)]
pub async fn spawn_mirage(mirage: &Mirage) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    let server = mirage.server().clone();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = rx.await;
            })
            .await
    });

    TestServer {
        addr,
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

/// Build and serve Mirage from a JSON document
#[allow(dead_code)]
pub async fn start_mirage(document: Value) -> TestServer {
    let mirage = build_mirage(document)
        .await
        .expect("failed to build Mirage");
    spawn_mirage(&mirage).await
}

/// Initialize test logging (call once per test module)
pub fn init_test_logging() {
    // Don't initialize logging in tests - let the library handle it
    // This prevents conflicts with the library's logging initialization
}
