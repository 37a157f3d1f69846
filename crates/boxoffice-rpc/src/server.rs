//! TCP server for a downstream service's [`MessageRouter`]

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use boxoffice_core::{RpcError, RpcErrorCode};
use serde_json::json;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::frame::{read_frame, write_frame, FrameError, RequestFrame, ResponseFrame};
use crate::router::MessageRouter;

/// Errors that can occur when running the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind: {0}")]
    Bind(io::Error),
    #[error("Failed to accept connection: {0}")]
    Accept(io::Error),
    #[error("Failed to read local address: {0}")]
    LocalAddr(io::Error),
}

/// Serves a [`MessageRouter`] over length-prefixed JSON frames.
///
/// Each connection may carry many requests; every request is dispatched on
/// its own task and answered with the id it arrived with, in completion order.
pub struct TcpServer {
    listener: TcpListener,
    router: Arc<MessageRouter>,
}

impl TcpServer {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        router: MessageRouter,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
        Ok(Self::from_listener(listener, router))
    }

    pub fn from_listener(listener: TcpListener, router: MessageRouter) -> Self {
        Self {
            listener,
            router: Arc::new(router),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Accept connections until the process exits
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(
            service = %self.router.service(),
            %addr,
            patterns = ?self.router.patterns(),
            "Message server listening"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(service = %self.router.service(), "Message server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(ServerError::Accept)?;
                    debug!(%peer, "Accepted connection");
                    tokio::spawn(handle_connection(self.router.clone(), stream, peer));
                }
            }
        }
    }
}

async fn handle_connection(router: Arc<MessageRouter>, stream: TcpStream, peer: SocketAddr) {
    let _ = stream.set_nodelay(true);
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));

    loop {
        match read_frame::<_, RequestFrame>(&mut reader).await {
            Ok(Some(frame)) => {
                tokio::spawn(answer(router.clone(), writer.clone(), frame));
            }
            Ok(None) => {
                debug!(%peer, "Connection closed by peer");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "Dropping connection after unreadable frame");
                break;
            }
        }
    }
}

async fn answer(
    router: Arc<MessageRouter>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    frame: RequestFrame,
) {
    let RequestFrame { id, pattern, data } = frame;

    let reply = match router.dispatch(&pattern, data).await {
        Ok(response) => ResponseFrame::ok(id, response),
        Err(payload) => {
            debug!(id, %pattern, code = %payload.code, "Handler reported failure");
            ResponseFrame::err(id, payload.to_wire())
        }
    };

    let mut writer = writer.lock().await;
    match write_frame(&mut *writer, &reply).await {
        Ok(()) => {}
        // Nothing reached the socket, so the caller can still get an error reply
        Err(e @ (FrameError::TooLarge(_) | FrameError::Encoding(_))) => {
            warn!(id, %pattern, error = %e, "Response could not be framed");
            let payload = RpcError::from_code(RpcErrorCode::InternalServerError)
                .with_details(json!({ "error": e.to_string() }))
                .into_payload();
            let fallback = ResponseFrame::err(id, payload.to_wire());
            if let Err(e) = write_frame(&mut *writer, &fallback).await {
                warn!(id, %pattern, error = %e, "Failed to write error response");
            }
        }
        Err(e) => warn!(id, %pattern, error = %e, "Failed to write response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::io::AsyncWriteExt;

    async fn start(router: MessageRouter) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let server = TcpServer::bind("127.0.0.1:0", router).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(server.serve_with_shutdown(async {
            let _ = rx.await;
        }));
        (addr, tx)
    }

    #[tokio::test]
    async fn answers_request_frames() {
        let router = crate::ping::register(MessageRouter::new("catalog"));
        let (addr, _shutdown) = start(router).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = RequestFrame {
            id: 42,
            pattern: "service.ping".to_string(),
            data: json!({"from": "test"}),
        };
        write_frame(&mut stream, &request).await.unwrap();

        let reply: ResponseFrame = read_frame(&mut stream).await.unwrap().unwrap();
        assert_eq!(reply.id, 42);
        assert_eq!(reply.response.unwrap()["service"], json!("catalog"));
        assert!(reply.err.is_none());
    }

    #[tokio::test]
    async fn unknown_pattern_answers_with_error_payload() {
        let (addr, _shutdown) = start(MessageRouter::new("catalog")).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = RequestFrame {
            id: 1,
            pattern: "nope".to_string(),
            data: Value::Null,
        };
        write_frame(&mut stream, &request).await.unwrap();

        let reply: ResponseFrame = read_frame(&mut stream).await.unwrap().unwrap();
        assert_eq!(reply.err.unwrap()["code"], json!("NOT_FOUND"));
    }

    #[tokio::test]
    async fn garbage_frame_closes_connection() {
        let (addr, _shutdown) = start(MessageRouter::new("catalog")).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_u32(4).await.unwrap();
        stream.write_all(b"!!!!").await.unwrap();

        let next: Option<ResponseFrame> = read_frame(&mut stream).await.unwrap_or(None);
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn oversized_response_answers_with_internal_error() {
        let router = MessageRouter::new("media").route("media.big", |_: Value| async move {
            anyhow::Ok("x".repeat(crate::frame::MAX_FRAME_LEN as usize + 1))
        });
        let (addr, _shutdown) = start(router).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = RequestFrame {
            id: 9,
            pattern: "media.big".to_string(),
            data: Value::Null,
        };
        write_frame(&mut stream, &request).await.unwrap();

        let reply: ResponseFrame = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            read_frame(&mut stream),
        )
        .await
        .unwrap()
        .unwrap()
        .unwrap();
        assert_eq!(reply.id, 9);
        let err = reply.err.unwrap();
        assert_eq!(err["code"], json!("INTERNAL_SERVER_ERROR"));
        assert_eq!(err["message"], json!("Internal Server Error"));

        // The connection keeps serving
        let request = RequestFrame {
            id: 10,
            pattern: "media.missing".to_string(),
            data: Value::Null,
        };
        write_frame(&mut stream, &request).await.unwrap();
        let reply: ResponseFrame = read_frame(&mut stream).await.unwrap().unwrap();
        assert_eq!(reply.id, 10);
    }

    #[tokio::test]
    async fn shutdown_stops_accept_loop() {
        let server = TcpServer::bind("127.0.0.1:0", MessageRouter::new("catalog"))
            .await
            .unwrap();
        let result = server.serve_with_shutdown(async {}).await;
        assert!(result.is_ok());
    }
}
