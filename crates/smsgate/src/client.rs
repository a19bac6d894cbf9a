//! GatewayClient -- the application-facing handle.
//!
//! A client bundles the session loop, the command exchange and the SMS
//! submitter for one gateway. It is cheap to clone; every clone drives the
//! same session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use smsgate_ami::exchange::CommandExchange;
use smsgate_ami::router::SmsHandler;
use smsgate_ami::session::{EVENT_CHANNEL_CAPACITY, SessionManager};
use smsgate_ami::sms::SmsSubmitter;
use smsgate_core::error::{Error, Result};
use smsgate_core::events::GatewayEvent;
use smsgate_core::frame::Frame;
use smsgate_core::transport::Connector;

use crate::config::GatewayConfig;

/// Handle to one gateway.
#[derive(Clone)]
pub struct GatewayClient {
    config: Arc<GatewayConfig>,
    session: Arc<SessionManager>,
    sms: SmsSubmitter,
    shutdown: CancellationToken,
}

impl GatewayClient {
    pub(crate) fn new(
        config: GatewayConfig,
        connector: Arc<dyn Connector>,
        handler: Option<Arc<dyn SmsHandler>>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let exchange = Arc::new(CommandExchange::new(config.follow_timeout));
        let session = Arc::new(SessionManager::new(
            connector,
            config.session_config(),
            Arc::clone(&exchange),
            handler,
            event_tx,
        ));
        let sms = SmsSubmitter::new(exchange).with_wait(config.command_wait);

        Self {
            config: Arc::new(config),
            session,
            sms,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the session loop on the current task. Returns only after
    /// [`shutdown`](GatewayClient::shutdown).
    pub async fn connect(&self) {
        tracing::info!(addr = %self.config.addr(), "starting gateway session loop");
        self.session.run(self.shutdown.clone()).await;
    }

    /// Run the session loop on a background task.
    pub fn spawn(&self) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move { client.connect().await })
    }

    /// Stop the session loop and close the current session.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.session.subscribe()
    }

    /// Wait until a session is logged in, up to `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let mut events = self.subscribe();
        if self.is_ready() {
            return Ok(());
        }

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(GatewayEvent::Connected) => return Ok(()),
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) if self.is_ready() => return Ok(()),
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return Err(Error::NotConnected),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Send a raw gateway CLI command and wait up to `wait` for its reply.
    ///
    /// A reply that never comes yields the synthetic `Timeout` frame, not
    /// an error. Fails with [`Error::NotConnected`] when no session is up.
    pub async fn send_command(&self, command: &str, wait: Duration) -> Result<Frame> {
        self.session.exchange().send_command(command, wait).await
    }

    /// [`send_command`](GatewayClient::send_command) with the configured
    /// default wait.
    pub async fn command(&self, command: &str) -> Result<Frame> {
        self.send_command(command, self.config.command_wait).await
    }

    /// Issue the keepalive command on demand.
    pub async fn ping(&self) -> Result<Frame> {
        self.command(&self.config.keepalive_command).await
    }

    /// Send an SMS through `sim`, returning the replies to all three
    /// command variants in issue order.
    pub async fn send_sms(&self, number: &str, text: &str, sim: u32) -> Result<Vec<Frame>> {
        if number.trim().is_empty() {
            return Err(Error::InvalidParameter("destination number must not be empty".into()));
        }
        self.sms.send(number, text, sim).await
    }
}
