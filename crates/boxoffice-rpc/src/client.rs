//! TCP client for one downstream service
//!
//! A [`TcpClient`] keeps one long-lived connection, opened lazily on the first
//! call and re-opened after it breaks. Concurrent calls share the connection
//! and are matched to their responses by request id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boxoffice_core::{ClientError, ClientResult, ServiceAddress, ServiceClient, ServiceIdentity};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::frame::{read_frame, write_frame, RequestFrame, ResponseFrame};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<ResponseFrame>>>>;

/// One open socket plus the calls waiting on it
struct Connection {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Removes a pending slot when the call finishes or is abandoned
struct PendingSlot {
    pending: Pending,
    id: u64,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// [`ServiceClient`] over a direct socket connection
pub struct TcpClient {
    identity: ServiceIdentity,
    host: String,
    port: u16,
    connect_timeout: Duration,
    next_id: AtomicU64,
    connection: tokio::sync::Mutex<Option<Arc<Connection>>>,
}

impl TcpClient {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            identity: ServiceIdentity::tcp(name, host.clone(), port),
            host,
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            next_id: AtomicU64::new(1),
            connection: tokio::sync::Mutex::new(None),
        }
    }

    /// Build a client from a configured identity.
    /// Returns `None` when the identity does not describe a TCP address.
    pub fn from_identity(identity: &ServiceIdentity) -> Option<Self> {
        match &identity.address {
            ServiceAddress::Tcp { host, port } => {
                Some(Self::new(identity.name.clone(), host.clone(), *port))
            }
            ServiceAddress::Local => None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether a live connection is currently held
    pub async fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| !conn.is_closed())
    }

    /// `host:port`, with IPv6 literals bracketed
    fn display_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    async fn connection(&self) -> ClientResult<Arc<Connection>> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            if !conn.is_closed() {
                return Ok(conn.clone());
            }
            debug!(service = %self.identity.name, "Previous connection closed, reconnecting");
        }

        let target = (self.host.as_str(), self.port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(target))
            .await
            .map_err(|_| {
                ClientError::Transport(format!("connect to {} timed out", self.display_addr()))
            })?
            .map_err(|e| {
                ClientError::Transport(format!("connect to {}: {}", self.display_addr(), e))
            })?;
        let _ = stream.set_nodelay(true);

        info!(
            service = %self.identity.name,
            addr = %self.display_addr(),
            "Connected to service"
        );

        let (reader, writer) = stream.into_split();
        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_responses(
            self.identity.name.clone(),
            reader,
            pending.clone(),
            closed.clone(),
        ));

        let conn = Arc::new(Connection {
            writer: tokio::sync::Mutex::new(writer),
            pending,
            closed,
            reader,
        });
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

/// Route response frames to their waiting callers until the socket fails.
/// On exit every waiting caller is released with `ConnectionClosed`.
async fn read_responses(
    service: String,
    mut reader: OwnedReadHalf,
    pending: Pending,
    closed: Arc<AtomicBool>,
) {
    loop {
        match read_frame::<_, ResponseFrame>(&mut reader).await {
            Ok(Some(frame)) => {
                let waiter = pending.lock().remove(&frame.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(frame);
                    }
                    None => debug!(%service, id = frame.id, "Response for abandoned call"),
                }
            }
            Ok(None) => {
                debug!(%service, "Service closed the connection");
                break;
            }
            Err(e) => {
                warn!(%service, error = %e, "Connection to service failed");
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
    pending.lock().clear();
}

#[async_trait]
impl ServiceClient for TcpClient {
    fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    async fn send(&self, pattern: &str, data: Value) -> ClientResult<Value> {
        let conn = self.connection().await?;
        self.call_on(&conn, pattern, data).await
    }
}

impl TcpClient {
    async fn call_on(&self, conn: &Connection, pattern: &str, data: Value) -> ClientResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = oneshot::channel();
        conn.pending.lock().insert(id, tx);
        let _slot = PendingSlot {
            pending: conn.pending.clone(),
            id,
        };
        // The reader may have shut down and drained the map before the insert
        if conn.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }

        let request = RequestFrame {
            id,
            pattern: pattern.to_string(),
            data,
        };
        {
            let mut writer = conn.writer.lock().await;
            if let Err(e) = write_frame(&mut *writer, &request).await {
                conn.closed.store(true, Ordering::Release);
                return Err(ClientError::Transport(e.to_string()));
            }
        }

        let frame = rx.await.map_err(|_| ClientError::ConnectionClosed)?;
        frame.into_result().map_err(ClientError::Rpc)
    }
}
