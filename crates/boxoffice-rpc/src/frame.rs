//! Length-prefixed JSON frames
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! UTF-8 JSON.

use std::fmt;
use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame body accepted in either direction
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// The piece of a frame that was being read or written when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePart {
    Length,
    Body,
}

impl fmt::Display for FramePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePart::Length => write!(f, "length"),
            FramePart::Body => write!(f, "body"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to write frame {0}: {1}")]
    Writing(FramePart, io::Error),
    #[error("failed to read frame {0}: {1}")]
    Reading(FramePart, io::Error),
    #[error("encoding failed: {0}")]
    Encoding(serde_json::Error),
    #[error("decoding failed: {0}")]
    Decoding(serde_json::Error),
    #[error("frame of {0} bytes exceeds limit of {MAX_FRAME_LEN}")]
    TooLarge(usize),
}

/// A message-pattern request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub pattern: String,
    #[serde(default)]
    pub data: Value,
}

/// Reply to a [`RequestFrame`] with the same `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<Value>,
}

impl ResponseFrame {
    pub fn ok(id: u64, response: Value) -> Self {
        Self {
            id,
            response: Some(response),
            err: None,
        }
    }

    pub fn err(id: u64, err: Value) -> Self {
        Self {
            id,
            response: None,
            err: Some(err),
        }
    }

    /// Split into the response value or the error value.
    /// A frame carrying neither is a successful `null` response.
    pub fn into_result(self) -> Result<Value, Value> {
        match (self.response, self.err) {
            (_, Some(err)) => Err(err),
            (Some(response), None) => Ok(response),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Encode `message` and write it as one frame
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message).map_err(FrameError::Encoding)?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or(FrameError::TooLarge(body.len()))?;

    writer
        .write_u32(len)
        .await
        .map_err(|e| FrameError::Writing(FramePart::Length, e))?;
    writer
        .write_all(&body)
        .await
        .map_err(|e| FrameError::Writing(FramePart::Body, e))?;
    writer
        .flush()
        .await
        .map_err(|e| FrameError::Writing(FramePart::Body, e))?;

    Ok(())
}

/// Read one frame and decode it.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(FrameError::Reading(FramePart::Length, e)),
    };

    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len as usize));
    }

    let mut body = vec![0; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| FrameError::Reading(FramePart::Body, e))?;

    serde_json::from_slice(&body)
        .map(Some)
        .map_err(FrameError::Decoding)
}
