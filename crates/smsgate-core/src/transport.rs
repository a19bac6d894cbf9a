//! Transport and connector traits for gateway communication.
//!
//! The [`Transport`] trait abstracts over the byte stream to the gateway.
//! The session IO task operates on a `Transport` rather than directly on a
//! `TcpStream`, which lets the same engine run against a real socket or a
//! `MockTransport` from the `smsgate-test-harness` crate.
//!
//! A [`Connector`] produces a fresh transport for every session generation.
//! The reconnect loop calls it once per attempt and never reuses a transport
//! from a previous generation.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to the gateway.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes, returning once all of them are written and flushed.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes into the provided buffer.
    ///
    /// Returns the number of bytes read. Waits up to `timeout` for data and
    /// returns [`Error::Timeout`](crate::error::Error::Timeout) if none
    /// arrives. A closed peer is reported as
    /// [`Error::ConnectionLost`](crate::error::Error::ConnectionLost), never
    /// as `Ok(0)`.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Factory for new transports, one per session generation.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to the gateway.
    async fn connect(&self) -> Result<Box<dyn Transport>>;

    /// Human-readable peer description for logging (e.g. `"10.0.0.2:5038"`).
    fn peer(&self) -> String;
}
