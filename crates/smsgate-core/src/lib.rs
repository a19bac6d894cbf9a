//! smsgate-core: Core traits, types, and error definitions for smsgate.
//!
//! This crate defines the pieces shared by every layer of the gateway
//! client: the byte-level transport abstraction, the decoded protocol frame,
//! and the events applications subscribe to.
//!
//! # Key types
//!
//! - [`Frame`] -- one decoded `key: value` block from the gateway
//! - [`Transport`] / [`Connector`] -- byte-level communication channel
//! - [`GatewayEvent`] -- lifecycle and inbound SMS notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod frame;
pub mod helpers;
pub mod transport;

// Re-export key types at crate root for ergonomic `use smsgate_core::*`.
pub use error::{Error, Result};
pub use events::{GatewayEvent, SmsMessage};
pub use frame::{END_COMMAND_MARKER, Frame};
pub use helpers::normalize_sim;
pub use transport::{Connector, Transport};
