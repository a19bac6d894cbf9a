//! Asynchronous gateway event types.
//!
//! Events are emitted by the session manager through a tokio broadcast
//! channel. Applications subscribe to track session readiness and to receive
//! inbound SMS without registering a handler.

/// An inbound SMS, percent-decoded and ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    /// Originating number as reported in the `Sender` field.
    pub sender: String,
    /// SIM/port the message arrived on (`GsmPort`, falling back to `Port`).
    pub sim_port: String,
    /// Receive timestamp (`Recvtime`, falling back to `Time`).
    pub timestamp: String,
    /// Decoded message body.
    pub text: String,
}

/// An event emitted by the session manager.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Logged in; commands may now be issued.
    Connected,

    /// The session ended and its reply queue was discarded.
    Disconnected,

    /// Waiting out the reconnect delay before the next attempt.
    Reconnecting {
        /// The reconnection attempt number (1-based).
        attempt: u32,
    },

    /// An inbound SMS was received.
    SmsReceived(SmsMessage),
}
