//! Transport implementations for smsgate.
//!
//! The gateway's manager interface is reachable over plain TCP only, so this
//! crate provides a single concrete [`Transport`](smsgate_core::Transport):
//!
//! - [`TcpTransport`]: one TCP connection to the gateway's manager port
//! - [`TcpConnector`]: opens a fresh [`TcpTransport`] per session generation
//!
//! # Example
//!
//! ```no_run
//! use smsgate_transport::TcpTransport;
//! use smsgate_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> smsgate_core::Result<()> {
//! let mut transport = TcpTransport::connect("10.0.0.2:5038").await?;
//! transport
//!     .send(b"Action: Login\r\nUsername: admin\r\nSecret: admin\r\n\r\n")
//!     .await?;
//!
//! let mut buf = [0u8; 4096];
//! let n = transport.receive(&mut buf, Duration::from_secs(3)).await?;
//! # Ok(())
//! # }
//! ```

pub mod tcp;

pub use tcp::{DEFAULT_CONNECT_TIMEOUT, TcpConnector, TcpTransport};
