//! Connection abstraction carrying protocol frames.
//!
//! Transport is transparent to message semantics: it moves one
//! newline-delimited frame at a time and surfaces disconnects distinctly
//! from other I/O faults. Request/response pairing happens above this
//! layer, keyed by the request id.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::TransportError;

/// Maximum size of a single frame (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// A bidirectional, ordered frame channel between two peers.
#[async_trait]
pub trait Connection: Send {
    /// Send one frame. The frame must not contain a newline.
    async fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Receive the next frame, blocking until one arrives.
    ///
    /// Returns [`TransportError::Disconnected`] when the peer goes away.
    async fn recv(&mut self) -> Result<String, TransportError>;

    /// Close the connection. Further use fails with `Disconnected`.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A [`Connection`] over any async byte stream, using newline-delimited
/// frames.
pub struct StreamConnection<R, W> {
    reader: BufReader<R>,
    writer: W,
    closed: bool,
}

impl<R, W> StreamConnection<R, W>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    pub fn from_parts(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            closed: false,
        }
    }
}

/// An in-process connection pair, for tests and same-process wiring.
///
/// Frames sent on one end arrive on the other, in order.
pub fn duplex_pair() -> (
    StreamConnection<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>,
    StreamConnection<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>,
) {
    let (a, b) = tokio::io::duplex(MAX_FRAME_SIZE);
    let (ar, aw) = tokio::io::split(a);
    let (br, bw) = tokio::io::split(b);
    (
        StreamConnection::from_parts(ar, aw),
        StreamConnection::from_parts(br, bw),
    )
}

/// A TCP-backed connection.
pub type TcpConnection = StreamConnection<OwnedReadHalf, OwnedWriteHalf>;

/// Connect to a TCP endpoint.
pub async fn connect_tcp(addr: &str) -> Result<TcpConnection, TransportError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    tracing::debug!(addr, "connected");
    Ok(tcp_connection(stream))
}

/// Wrap an accepted TCP stream (server side).
pub fn tcp_connection(stream: TcpStream) -> TcpConnection {
    let (reader, writer) = stream.into_split();
    StreamConnection::from_parts(reader, writer)
}

#[async_trait]
impl<R, W> Connection for StreamConnection<R, W>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        let mut line = String::new();
        // Bounded read: an oversized frame is rejected at the cap rather
        // than buffered whole. The limit leaves room for the newline of a
        // frame that is exactly MAX_FRAME_SIZE long.
        let limit = (MAX_FRAME_SIZE + 1) as u64;
        let bytes_read = (&mut self.reader).take(limit).read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(TransportError::Disconnected);
        }
        if bytes_read as u64 >= limit && !line.ends_with('\n') {
            return Err(TransportError::FrameTooLarge {
                size: line.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.writer.shutdown().await?;
        }
        Ok(())
    }
}
