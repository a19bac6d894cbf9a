//! Protocol engine for the GSM gateway's manager interface.
//!
//! The gateway exposes an Asterisk-manager-style text protocol on a raw TCP
//! port. This crate turns a [`Connector`](smsgate_core::Connector) into a
//! long-lived, self-healing session with a request/reply surface.
//!
//! # Architecture
//!
//! - [`protocol`] -- block framing, parsing and the login/command encoders
//! - [`router`] -- splits decoded frames into SMS events and replies
//! - [`io`] -- the per-session IO task that owns the transport
//! - [`exchange`] -- one-at-a-time command submission with `Follows` paging
//! - [`session`] -- connect, login, keepalive and the reconnect loop
//! - [`sms`] -- the three-variant SMS send

pub mod exchange;
pub mod io;
pub mod protocol;
pub mod router;
pub mod session;
pub mod sms;

pub use exchange::{CommandExchange, DEFAULT_COMMAND_WAIT, DEFAULT_FOLLOW_TIMEOUT, SessionLink};
pub use router::{FrameRouter, SmsHandler};
pub use session::{SessionConfig, SessionManager};
pub use sms::SmsSubmitter;
