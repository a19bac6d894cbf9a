//! Scripted localhost gateway for end-to-end tests over TCP.
//!
//! [`MockGateway`] binds a random localhost port up front and, once
//! [`start`](MockGateway::start)ed, accepts one connection per script, in
//! order. Each script is a list of [`Step`]s. A script that ends without
//! [`Step::Close`] keeps its connection open until the client hangs up.
//!
//! # Example
//!
//! ```
//! use smsgate_test_harness::{MockGateway, Step};
//!
//! # async fn example() -> smsgate_core::Result<()> {
//! let gateway = MockGateway::bind().await?;
//! let port = gateway.port();
//! let handle = gateway.start(vec![vec![
//!     Step::Expect(b"Action: Login\r\nUsername: u\r\nSecret: p\r\n\r\n".to_vec()),
//!     Step::Send(b"Response: Success\r\nMessage: Authentication accepted\r\n\r\n".to_vec()),
//! ]]);
//! // ... point a TcpConnector at 127.0.0.1:port ...
//! # drop(handle);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use smsgate_core::error::{Error, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One action in a connection script.
#[derive(Debug, Clone)]
pub enum Step {
    /// Read exactly these bytes from the client; fail on mismatch.
    Expect(Vec<u8>),
    /// Write these bytes to the client.
    Send(Vec<u8>),
    /// Sleep before the next step.
    Pause(Duration),
    /// Drop the connection.
    Close,
}

/// A scripted gateway listening on `127.0.0.1`.
pub struct MockGateway {
    listener: TcpListener,
    port: u16,
}

impl MockGateway {
    /// Bind a random free port. Connections queue in the backlog until
    /// [`start`](MockGateway::start) is called.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock gateway: {e}")))?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Serve one connection per script. The task resolves to `Err` with a
    /// description of the first mismatch or I/O failure.
    pub fn start(self, scripts: Vec<Vec<Step>>) -> JoinHandle<std::result::Result<(), String>> {
        tokio::spawn(async move {
            for (conn, script) in scripts.into_iter().enumerate() {
                let (stream, _) = self
                    .listener
                    .accept()
                    .await
                    .map_err(|e| format!("connection {conn}: accept failed: {e}"))?;
                run_script(stream, script)
                    .await
                    .map_err(|e| format!("connection {conn}: {e}"))?;
            }
            Ok(())
        })
    }
}

async fn run_script(mut stream: TcpStream, script: Vec<Step>) -> std::result::Result<(), String> {
    for (i, step) in script.into_iter().enumerate() {
        match step {
            Step::Expect(expected) => {
                let mut got = vec![0u8; expected.len()];
                stream
                    .read_exact(&mut got)
                    .await
                    .map_err(|e| format!("step {i}: read failed: {e}"))?;
                if got != expected {
                    return Err(format!(
                        "step {i}: expected {:?}, got {:?}",
                        String::from_utf8_lossy(&expected),
                        String::from_utf8_lossy(&got)
                    ));
                }
            }
            Step::Send(bytes) => {
                stream
                    .write_all(&bytes)
                    .await
                    .map_err(|e| format!("step {i}: write failed: {e}"))?;
            }
            Step::Pause(d) => tokio::time::sleep(d).await,
            Step::Close => return Ok(()),
        }
    }

    // Hold the connection until the client goes away.
    let mut sink = [0u8; 1024];
    while let Ok(n) = stream.read(&mut sink).await {
        if n == 0 {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plays_script_in_order() {
        let gateway = MockGateway::bind().await.unwrap();
        let addr = gateway.addr();
        let handle = gateway.start(vec![vec![
            Step::Send(b"hello".to_vec()),
            Step::Expect(b"ping".to_vec()),
            Step::Send(b"pong".to_vec()),
            Step::Close,
        ]]);

        let mut client = TcpStream::connect(&addr).await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        // Close step hangs up.
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn mismatch_is_reported() {
        let gateway = MockGateway::bind().await.unwrap();
        let addr = gateway.addr();
        let handle = gateway.start(vec![vec![Step::Expect(b"login".to_vec())]]);

        let mut client = TcpStream::connect(&addr).await.unwrap();
        client.write_all(b"LOGIN").await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.contains("step 0"), "{err}");
    }

    #[tokio::test]
    async fn serves_one_connection_per_script() {
        let gateway = MockGateway::bind().await.unwrap();
        let addr = gateway.addr();
        let handle = gateway.start(vec![
            vec![Step::Send(b"1".to_vec()), Step::Close],
            vec![Step::Send(b"2".to_vec()), Step::Close],
        ]);

        for expected in [b"1", b"2"] {
            let mut client = TcpStream::connect(&addr).await.unwrap();
            let mut buf = Vec::new();
            client.read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf, expected);
        }
        handle.await.unwrap().unwrap();
    }
}
