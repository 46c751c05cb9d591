//! Response bodies: buffered or incrementally streamed.
//!
//! A [`Body::Stream`] is never buffered by the dispatcher. The transport pulls
//! chunks one at a time, so unbounded sources (server push) and large files
//! are sent without holding the whole payload in memory.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_onion::core::Body;
//!
//! let (tx, body) = Body::channel(16);
//!
//! tokio::spawn(async move {
//!     tx.send("data: hello\n\n").await.ok();
//!     tx.send("data: world\n\n").await.ok();
//! });
//!
//! ctx.stream(body)?;
//! ```

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;

use super::error::{Error, Result};

/// Default buffer size for streaming channels.
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 100;

/// Boxed byte source pulled by the transport.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// Response body.
pub enum Body {
    /// No body.
    Empty,
    /// Complete body held in memory.
    Full(Bytes),
    /// Incremental byte source.
    Stream(BodyStream),
}

impl Body {
    /// Create a streamed body from any byte stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Body::Stream(Box::pin(stream))
    }

    /// Create a streamed body that reads from an async reader (e.g. a file).
    ///
    /// The reader is dropped as soon as the body is dropped, which happens
    /// when the client disconnects mid-transfer.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Body::from_stream(ReaderStream::new(reader))
    }

    /// Create a channel-backed streamed body.
    ///
    /// Chunks sent through the returned [`BodySender`] are forwarded to the
    /// client as they arrive. The stream ends when every sender is dropped.
    pub fn channel(buffer_size: usize) -> (BodySender, Body) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let stream = ReceiverStream::new(rx).map(|chunk: StreamChunk| Ok(chunk.data));
        (BodySender { tx }, Body::from_stream(stream))
    }

    /// Check if this body is empty (streams are never considered empty).
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Full(bytes) => bytes.is_empty(),
            Body::Stream(_) => false,
        }
    }

    /// Check if this body is streamed.
    #[inline]
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// Exact length, when known up front.
    #[inline]
    pub fn size_hint(&self) -> Option<usize> {
        match self {
            Body::Empty => Some(0),
            Body::Full(bytes) => Some(bytes.len()),
            Body::Stream(_) => None,
        }
    }

    /// Buffer the whole body.
    ///
    /// Intended for tests and small payloads; the transport never calls this.
    pub async fn collect(self) -> Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(bytes) => Ok(bytes),
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Full(bytes) => f.debug_tuple("Body::Full").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Body::Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Body::Full(Bytes::from(data))
    }
}

impl From<String> for Body {
    fn from(data: String) -> Self {
        Body::Full(Bytes::from(data))
    }
}

impl From<&'static str> for Body {
    fn from(data: &'static str) -> Self {
        Body::Full(Bytes::from_static(data.as_bytes()))
    }
}

/// A chunk of streaming data.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    /// The data bytes for this chunk.
    pub data: Bytes,
}

impl StreamChunk {
    /// Create a new stream chunk from bytes.
    #[inline]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Check if this chunk is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for StreamChunk {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for StreamChunk {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
        }
    }
}

impl From<String> for StreamChunk {
    fn from(data: String) -> Self {
        Self {
            data: Bytes::from(data),
        }
    }
}

impl From<&str> for StreamChunk {
    fn from(data: &str) -> Self {
        Self {
            data: Bytes::copy_from_slice(data.as_bytes()),
        }
    }
}

/// Producer half of a channel-backed [`Body`].
#[derive(Clone, Debug)]
pub struct BodySender {
    tx: mpsc::Sender<StreamChunk>,
}

impl BodySender {
    /// Send a chunk, waiting for buffer space.
    ///
    /// Fails with [`Error::Transport`] once the body has been dropped, which
    /// is how a producer learns that the client disconnected.
    pub async fn send(&self, chunk: impl Into<StreamChunk>) -> Result<()> {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx
            .send(chunk)
            .await
            .map_err(|_| Error::Transport("response stream closed by peer".to_string()))
    }

    /// Check if the receiving side is gone.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
