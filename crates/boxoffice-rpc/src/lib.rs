//! boxoffice-rpc - Message-pattern transport
//!
//! Downstream services register handlers for message patterns in a
//! [`MessageRouter`]; the gateway reaches them through a [`TcpClient`] or, when
//! both live in one process, a [`LocalClient`].
//!
//! # Architecture
//!
//! ```text
//!   gateway                                   downstream service
//! ┌──────────────┐   {id, pattern, data}   ┌──────────────────────────┐
//! │  TcpClient   │ ──────────────────────▶ │ TcpServer                │
//! │ (one socket, │                         │   └─ MessageRouter        │
//! │  multiplexed)│ ◀────────────────────── │       ├─ "service.ping"   │
//! └──────────────┘  {id, response | err}   │       └─ ...              │
//!                                          └──────────────────────────┘
//! ```
//!
//! Every failure leaving a handler is normalized into an
//! [`RpcErrorPayload`](boxoffice_core::RpcErrorPayload) before it is written
//! to the wire.

pub mod client;
pub mod frame;
pub mod local;
pub mod ping;
pub mod router;
pub mod server;

pub use client::TcpClient;
pub use frame::{FrameError, RequestFrame, ResponseFrame, MAX_FRAME_LEN};
pub use local::LocalClient;
pub use router::MessageRouter;
pub use server::{ServerError, TcpServer};
