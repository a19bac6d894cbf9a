//! Error types for smsgate.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer,
//! configuration and application-layer errors are all captured here.

/// The error type for all smsgate operations.
///
/// Transport failures are normally absorbed by the session reconnect loop;
/// callers of the command API only ever see [`Error::NotConnected`] (no
/// session established) or a synthetic `Timeout` reply.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (TCP connect refused, socket failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (unexpected bytes from a scripted peer).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting on the gateway.
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to a builder or command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// No authenticated session with the gateway is established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the gateway was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("connection refused: 10.0.0.2:5038".into());
        assert_eq!(
            e.to_string(),
            "transport error: connection refused: 10.0.0.2:5038"
        );
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("unexpected send data".into());
        assert_eq!(e.to_string(), "protocol error: unexpected send data");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_config() {
        let e = Error::Config("GATEWAY_HOST is required".into());
        assert_eq!(e.to_string(), "configuration error: GATEWAY_HOST is required");
    }

    #[test]
    fn error_display_not_connected() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn error_display_connection_lost() {
        assert_eq!(Error::ConnectionLost.to_string(), "connection lost");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
