//! # smsgate -- async client for GSM/SMS gateways
//!
//! `smsgate` keeps a long-lived session to a multi-SIM GSM gateway that
//! exposes an Asterisk-manager-style text protocol over TCP. It logs in,
//! keeps the link alive, reconnects forever when the gateway goes away,
//! sends SMS through a chosen SIM and hands inbound SMS to an async
//! callback.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use smsgate::{EnvSource, GatewayBuilder, GatewayConfig, DEFAULT_ENV_FILE};
//!
//! #[tokio::main]
//! async fn main() -> smsgate::Result<()> {
//!     let config = GatewayConfig::from_env(&EnvSource::load(DEFAULT_ENV_FILE)?)?;
//!     let client = GatewayBuilder::from_config(config).build()?;
//!     client.spawn();
//!
//!     client.wait_ready(Duration::from_secs(10)).await?;
//!     for reply in client.send_sms("+15551234567", "hello", client.config().default_sim).await? {
//!         println!("{reply}");
//!     }
//!     client.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                          |
//! |------------------------|--------------------------------------------------|
//! | `smsgate-core`         | Frame, transport traits, events, errors          |
//! | `smsgate-transport`    | TCP transport and connector                      |
//! | `smsgate-ami`          | Protocol codec, session loop, command exchange   |
//! | **`smsgate`**          | This facade crate -- config, builder, client     |
//!
//! Commands are serialized: one command is in flight per client at any
//! time, and its reply window starts when it is issued. A command that gets
//! no reply resolves to a synthetic `Timeout` frame rather than an error.

pub mod builder;
pub mod client;
pub mod config;

pub use builder::GatewayBuilder;
pub use client::GatewayClient;
pub use config::{DEFAULT_ENV_FILE, DEFAULT_PORT, DEFAULT_SIM, EnvSource, GatewayConfig};

pub use smsgate_ami::router::SmsHandler;
pub use smsgate_ami::sms::{build_sms_commands, encode_sms_text};
pub use smsgate_core::{Error, Frame, GatewayEvent, Result, SmsMessage, normalize_sim};
