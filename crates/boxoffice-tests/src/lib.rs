//! End-to-end test harness for the box office stack
//!
//! Everything runs in the test process over real loopback sockets:
//! - [`TestService`] serves a [`MessageRouter`] on an ephemeral TCP port
//! - [`TestGateway`] serves the HTTP API on an ephemeral port, talking to
//!   its downstream services through the given client handles
//!
//! Both shut down when dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use boxoffice_api::{create_router, AppState};
use boxoffice_core::{ServiceClient, ServiceIdentity};
use boxoffice_gateway::ServiceRegistry;
use boxoffice_rpc::{ping, MessageRouter, TcpClient, TcpServer};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A downstream service listening on loopback
pub struct TestService {
    pub name: String,
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestService {
    /// Serve `router` on an ephemeral port
    pub async fn start(router: MessageRouter) -> anyhow::Result<Self> {
        let name = router.service().to_string();
        let server = TcpServer::bind("127.0.0.1:0", router).await?;
        let addr = server.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            server
                .serve_with_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Ok(Self {
            name,
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// A service that only answers `service.ping`
    pub async fn ping_only(name: &str) -> anyhow::Result<Self> {
        Self::start(ping::register(MessageRouter::new(name))).await
    }

    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::tcp(&self.name, self.addr.ip().to_string(), self.addr.port())
    }

    /// A fresh socket client for this service
    pub fn client(&self) -> Arc<dyn ServiceClient> {
        Arc::new(TcpClient::new(
            &self.name,
            self.addr.ip().to_string(),
            self.addr.port(),
        ))
    }

    /// Stop accepting connections
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// A socket client for a service that is not running
pub fn unreachable_client(name: &str) -> anyhow::Result<Arc<dyn ServiceClient>> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(Arc::new(TcpClient::new(name, "127.0.0.1", port)))
}

/// The gateway HTTP API listening on loopback
pub struct TestGateway {
    pub addr: SocketAddr,
    http: reqwest::Client,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestGateway {
    /// Serve the gateway API in front of `clients`, bounding every downstream
    /// call by `request_timeout`
    pub async fn start(
        clients: Vec<Arc<dyn ServiceClient>>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let registry = ServiceRegistry::with_clients(clients, request_timeout);
        let router = create_router(AppState::new("gateway", registry));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            addr,
            http,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// GET `path` and decode the JSON body
    pub async fn get(&self, path: &str) -> anyhow::Result<(u16, Value)> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    /// POST `body` as JSON to `path` and decode the JSON reply
    pub async fn post(&self, path: &str, body: &Value) -> anyhow::Result<(u16, Value)> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    /// Relay `pattern`/`data` to `service` through the gateway
    pub async fn relay(
        &self,
        service: &str,
        pattern: &str,
        data: Value,
    ) -> anyhow::Result<(u16, Value)> {
        let body = serde_json::json!({ "pattern": pattern, "data": data });
        self.post(&format!("/services/{}/messages", service), &body)
            .await
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
