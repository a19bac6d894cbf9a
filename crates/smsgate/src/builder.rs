//! GatewayBuilder -- fluent builder for [`GatewayClient`] instances.
//!
//! Separates configuration from construction so that callers can set
//! credentials, timing and the inbound SMS handler before the session loop
//! starts.
//!
//! # Example
//!
//! ```no_run
//! use smsgate::{GatewayBuilder, SmsMessage};
//! use std::time::Duration;
//!
//! # async fn example() -> smsgate::Result<()> {
//! let client = GatewayBuilder::new("10.0.0.2")
//!     .credentials("admin", "admin")
//!     .keepalive_interval(Duration::from_secs(30))
//!     .on_sms(|sms: SmsMessage| async move {
//!         println!("{} via SIM {}: {}", sms.sender, sms.sim_port, sms.text);
//!         Ok::<(), smsgate::Error>(())
//!     })
//!     .build()?;
//!
//! client.spawn();
//! client.wait_ready(Duration::from_secs(10)).await?;
//! let replies = client.send_sms("+15551234567", "hello", 1).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use smsgate_ami::router::SmsHandler;
use smsgate_core::error::{Error, Result};
use smsgate_core::transport::Connector;
use smsgate_transport::TcpConnector;

use crate::client::GatewayClient;
use crate::config::GatewayConfig;

/// Fluent builder for [`GatewayClient`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    handler: Option<Arc<dyn SmsHandler>>,
    connector: Option<Arc<dyn Connector>>,
}

impl GatewayBuilder {
    /// Start from defaults for the gateway at `host`.
    pub fn new(host: &str) -> Self {
        Self::from_config(GatewayConfig::new(host, "", ""))
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: GatewayConfig) -> Self {
        Self {
            config,
            handler: None,
            connector: None,
        }
    }

    /// Manager-interface port (default: 5038).
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn credentials(mut self, username: &str, secret: &str) -> Self {
        self.config.username = username.to_string();
        self.config.secret = secret.to_string();
        self
    }

    /// SIM used by callers that do not name one (default: 1).
    pub fn default_sim(mut self, sim: u32) -> Self {
        self.config.default_sim = sim;
        self
    }

    /// Fixed pause between session attempts (default: 3s).
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// How long to wait for the login reply (default: 3s).
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.config.login_timeout = timeout;
        self
    }

    /// Interval between keepalive commands (default: 60s).
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    /// Command used as keepalive (default: `gsm show spans`).
    pub fn keepalive_command(mut self, command: &str) -> Self {
        self.config.keepalive_command = command.to_string();
        self
    }

    /// TCP connect timeout (default: 5s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Default reply window for commands and SMS sends (default: 4s).
    pub fn command_wait(mut self, wait: Duration) -> Self {
        self.config.command_wait = wait;
        self
    }

    /// Per-frame wait while collecting `Follows` replies (default: 1s).
    pub fn follow_timeout(mut self, timeout: Duration) -> Self {
        self.config.follow_timeout = timeout;
        self
    }

    /// Register the inbound SMS handler. Each message is delivered on its
    /// own task; errors and panics are logged and otherwise ignored.
    pub fn on_sms<H: SmsHandler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Use a custom connector instead of TCP to `host:port`.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Validate the configuration and assemble the client. Nothing is
    /// connected until [`GatewayClient::connect`] or
    /// [`GatewayClient::spawn`] runs.
    pub fn build(self) -> Result<GatewayClient> {
        let config = self.config;

        if self.connector.is_none() && config.host.trim().is_empty() {
            return Err(Error::InvalidParameter("gateway host must not be empty".into()));
        }
        if config.username.is_empty() {
            return Err(Error::InvalidParameter("username must not be empty".into()));
        }
        if config.keepalive_interval.is_zero() {
            return Err(Error::InvalidParameter(
                "keepalive interval must be greater than zero".into(),
            ));
        }
        if config.keepalive_command.trim().is_empty() {
            return Err(Error::InvalidParameter("keepalive command must not be empty".into()));
        }
        if config.default_sim == 0 {
            return Err(Error::InvalidParameter("SIM numbers start at 1".into()));
        }

        let connector = self.connector.unwrap_or_else(|| {
            Arc::new(
                TcpConnector::new(&config.host, config.port).with_timeout(config.connect_timeout),
            )
        });

        Ok(GatewayClient::new(config, connector, self.handler))
    }
}
