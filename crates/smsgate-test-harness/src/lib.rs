//! smsgate-test-harness: Test utilities for smsgate.
//!
//! - [`MockTransport`] and [`MockConnector`] drive the protocol engine
//!   in-process with scripted request/response pairs and pushed frames.
//! - [`MockGateway`] is a localhost TCP server that plays a per-connection
//!   script, for end-to-end tests over a real socket.

pub mod mock_gateway;
pub mod mock_transport;

pub use mock_gateway::{MockGateway, Step};
pub use mock_transport::{MockConnector, MockTransport, SentLog};
