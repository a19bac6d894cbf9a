//! TCP transport to the gateway's manager port.
//!
//! [`TcpTransport`] implements [`Transport`] over a single `TcpStream`.
//! [`TcpConnector`] remembers the gateway address and hands out a new
//! transport on every call, which is what the session reconnect loop needs:
//! a dropped socket is never revived, the next generation dials again.

use async_trait::async_trait;
use smsgate_core::error::{Error, Result};
use smsgate_core::transport::{Connector, Transport};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default time allowed for the TCP handshake with the gateway.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected TCP stream to the gateway.
#[derive(Debug)]
pub struct TcpTransport {
    /// `None` once `close()` has run.
    stream: Option<TcpStream>,
    addr: String,
}

impl TcpTransport {
    /// Connect to `host:port` with [`DEFAULT_CONNECT_TIMEOUT`].
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to `host:port`, giving up after `timeout`.
    ///
    /// A refused connection is reported as [`Error::Transport`]; an expired
    /// handshake as [`Error::Timeout`].
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(addr = %addr, timeout_ms = timeout.as_millis(), "dialing gateway");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!(addr = %addr, error = %e, "gateway connect failed");
                return Err(connect_error(e, addr));
            }
            Err(_) => {
                tracing::warn!(addr = %addr, "gateway connect timed out");
                return Err(Error::Timeout);
            }
        };

        // Commands are tiny request/response blocks.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "could not set TCP_NODELAY");
        }

        tracing::info!(addr = %addr, "connected to gateway");
        Ok(Self::from_stream(stream, addr.to_string()))
    }

    /// Wrap an already-connected stream (e.g. one accepted in a test).
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// The `host:port` label this transport was created with.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        tracing::trace!(addr = %self.addr, bytes = data.len(), "tx");

        stream.write_all(data).await.map_err(data_error)?;
        stream.flush().await.map_err(data_error)?;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::debug!(addr = %self.addr, "gateway closed the connection");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    addr = %self.addr,
                    bytes = n,
                    data = %String::from_utf8_lossy(&buf[..n]),
                    "rx"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::warn!(addr = %self.addr, error = %e, "socket read failed");
                Err(data_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        // The peer may already be gone; shutdown failures are not interesting.
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(addr = %self.addr, error = %e, "shutdown on close failed");
        }
        tracing::debug!(addr = %self.addr, "connection closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Opens a new [`TcpTransport`] to a fixed gateway address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let transport = TcpTransport::connect_with_timeout(&self.addr, self.timeout).await?;
        Ok(Box::new(transport))
    }

    fn peer(&self) -> String {
        self.addr.clone()
    }
}

fn connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        ErrorKind::ConnectionRefused => Error::Transport(format!("connection refused: {addr}")),
        _ => Error::Io(e),
    }
}

fn data_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}
