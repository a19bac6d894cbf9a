//! Session lifecycle: connect, log in, run, reconnect.
//!
//! [`SessionManager::run`] drives one session generation at a time:
//!
//! 1. open a fresh transport through the [`Connector`];
//! 2. start the IO task and send `Action: Login`, waiting up to the login
//!    timeout for the first reply (which is discarded, whatever it says);
//! 3. attach the session to the [`CommandExchange`] and start the keepalive
//!    loop;
//! 4. when the IO task ends, stop the keepalive, detach the exchange (its
//!    reply queue goes with it), sleep the fixed reconnect delay, repeat.
//!
//! Nothing short of the shutdown token ends the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use smsgate_core::error::{Error, Result};
use smsgate_core::events::GatewayEvent;
use smsgate_core::transport::Connector;

use crate::exchange::{CommandExchange, DEFAULT_COMMAND_WAIT, SessionLink};
use crate::io::spawn_io_task;
use crate::protocol;
use crate::router::{FrameRouter, SmsHandler};

/// Fixed pause between session generations.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// How long to wait for the login reply.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Interval between keepalive commands.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Benign command sent to keep the session alive.
pub const DEFAULT_KEEPALIVE_COMMAND: &str = "gsm show spans";

/// Capacity of the [`GatewayEvent`] broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Credentials and timing for the session loop.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub username: String,
    pub secret: String,
    pub reconnect_delay: Duration,
    pub login_timeout: Duration,
    pub keepalive_interval: Duration,
    pub keepalive_command: String,
    /// Reply window for each keepalive command.
    pub keepalive_wait: Duration,
}

impl SessionConfig {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_command: DEFAULT_KEEPALIVE_COMMAND.to_string(),
            keepalive_wait: DEFAULT_COMMAND_WAIT,
        }
    }
}

/// Owns the connection lifecycle to one gateway.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    exchange: Arc<CommandExchange>,
    handler: Option<Arc<dyn SmsHandler>>,
    event_tx: broadcast::Sender<GatewayEvent>,
    ready: AtomicBool,
    generation: AtomicU64,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: SessionConfig,
        exchange: Arc<CommandExchange>,
        handler: Option<Arc<dyn SmsHandler>>,
        event_tx: broadcast::Sender<GatewayEvent>,
    ) -> Self {
        Self {
            connector,
            config,
            exchange,
            handler,
            event_tx,
            ready: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn exchange(&self) -> &Arc<CommandExchange> {
        &self.exchange
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.event_tx.subscribe()
    }

    /// `true` between a completed login and the end of that session.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Run session generations back to back until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let peer = self.connector.peer();
        let mut attempt: u32 = 0;

        loop {
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = self.run_session(generation, &shutdown).await;

            self.exchange.clear().await;
            if self.ready.swap(false, Ordering::SeqCst) {
                attempt = 0;
                let _ = self.event_tx.send(GatewayEvent::Disconnected);
                info!(addr = %peer, generation, "gateway session ended");
            }
            match outcome {
                Ok(()) => debug!(addr = %peer, generation, "session closed"),
                Err(e) => warn!(addr = %peer, generation, error = %e, "session failed"),
            }

            if shutdown.is_cancelled() {
                break;
            }

            attempt = attempt.saturating_add(1);
            let _ = self.event_tx.send(GatewayEvent::Reconnecting { attempt });
            info!(
                addr = %peer,
                attempt,
                delay_ms = self.config.reconnect_delay.as_millis(),
                "reconnecting to gateway"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        debug!(addr = %peer, "session loop stopped");
    }

    async fn run_session(&self, generation: u64, shutdown: &CancellationToken) -> Result<()> {
        debug!(addr = %self.connector.peer(), generation, "connecting");
        let transport = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            t = self.connector.connect() => t?,
        };

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let router = FrameRouter::new(reply_tx, self.handler.clone(), self.event_tx.clone());
        let io = spawn_io_task(transport, router);
        let mut link = SessionLink::new(io.writer.clone(), reply_rx, generation);

        if let Err(e) = self.login(&mut link).await {
            io.cancel.cancel();
            let _ = io.join().await;
            return Err(e);
        }

        self.exchange.install(link).await;
        self.ready.store(true, Ordering::SeqCst);
        let _ = self.event_tx.send(GatewayEvent::Connected);
        info!(addr = %self.connector.peer(), generation, "gateway session ready");

        let keepalive_cancel = CancellationToken::new();
        let keepalive = tokio::spawn(keepalive_loop(
            Arc::clone(&self.exchange),
            self.config.clone(),
            keepalive_cancel.clone(),
        ));

        let io_cancel = io.cancel.clone();
        let join = io.join();
        tokio::pin!(join);
        let finished = tokio::select! {
            r = &mut join => Some(r),
            _ = shutdown.cancelled() => None,
        };
        let result = match finished {
            Some(r) => r,
            None => {
                io_cancel.cancel();
                join.await
            }
        };

        keepalive_cancel.cancel();
        let _ = keepalive.await;
        result
    }

    async fn login(&self, link: &mut SessionLink) -> Result<()> {
        link.write(protocol::encode_login(
            &self.config.username,
            &self.config.secret,
        ))
        .await?;

        match link.next_reply(self.config.login_timeout).await {
            Some(reply) => debug!(
                response = ?reply.response(),
                message = ?reply.message(),
                "login reply"
            ),
            None => debug!("no login reply within timeout"),
        }

        if link.is_closed() {
            return Err(Error::ConnectionLost);
        }
        Ok(())
    }
}

async fn keepalive_loop(
    exchange: Arc<CommandExchange>,
    config: SessionConfig,
    cancel: CancellationToken,
) {
    loop {
        let tick = async {
            tokio::time::sleep(config.keepalive_interval).await;
            exchange
                .send_command(&config.keepalive_command, config.keepalive_wait)
                .await
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = tick => r,
        };

        match result {
            Ok(reply) => trace!(response = ?reply.response(), "keepalive"),
            Err(e) => {
                warn!(error = %e, "keepalive failed, stopping until reconnect");
                break;
            }
        }
    }
}
