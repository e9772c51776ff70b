//! Transport connectors.
//!
//! A connector performs the transport handshake and hands back a duplex
//! byte stream. The connection layer owns framing and lifecycle on top.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::io;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// A bidirectional byte stream.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Boxed transport stream returned by a [`Connector`].
pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens transport-level links to the monitoring service.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Perform the transport handshake.
    async fn connect(&self) -> io::Result<BoxedStream>;

    /// Returns a human-readable description of the endpoint.
    fn description(&self) -> &str;
}

/// Connects over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    description: String,
}

impl TcpConnector {
    /// Create a connector for a `host:port` address.
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let description = format!("tcp://{}", addr);
        Self { addr, description }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> io::Result<BoxedStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// An in-process connector backed by `tokio::io::duplex` pipes.
///
/// Each call to `connect` hands out the next queued client end; when the
/// queue is empty the connection is refused. Useful for tests and for
/// replaying captured sessions.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    pending: Mutex<VecDeque<DuplexStream>>,
}

impl MemoryConnector {
    /// Buffer size for each in-memory pipe.
    const PIPE_CAPACITY: usize = 64 * 1024;

    /// Create a connector with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new pipe and return its server end.
    pub fn push(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(Self::PIPE_CAPACITY);
        self.pending.lock().push_back(client);
        server
    }

    /// Number of queued, not yet connected pipes.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> io::Result<BoxedStream> {
        match self.pending.lock().pop_front() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "no in-memory peer queued",
            )),
        }
    }

    fn description(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_tcp_description() {
        assert_eq!(TcpConnector::new("localhost:5001").description(), "tcp://localhost:5001");
    }

    #[tokio::test]
    async fn test_memory_connector_pipes() {
        let connector = MemoryConnector::new();
        let mut server = connector.push();
        assert_eq!(connector.pending(), 1);

        let mut client = connector.connect().await.unwrap();
        assert_eq!(connector.pending(), 0);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_memory_connector_refuses_when_empty() {
        let connector = MemoryConnector::new();
        let err = connector.connect().await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }
}
