//! In-process mock transport for deterministic protocol tests.
//!
//! [`MockTransport`] implements [`Transport`] with an ordered list of
//! request/response expectations plus a queue of bytes the "gateway" pushes
//! on its own (events, stale replies). Once the transport is boxed and handed
//! to an IO task, the [`SentLog`] handle still shows what was written.
//!
//! # Example
//!
//! ```
//! use smsgate_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.push_inbound(b"Event: ReceivedSMS\r\nSender: 100\r\nContent: hi\r\n\r\n");
//! mock.expect(
//!     b"Action: Login\r\nUsername: u\r\nSecret: p\r\n\r\n",
//!     b"Response: Success\r\nMessage: Authentication accepted\r\n\r\n",
//! );
//! mock.close_when_drained();
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smsgate_core::error::{Error, Result};
use smsgate_core::transport::{Connector, Transport};

/// Shared record of every `send()` payload, in order.
pub type SentLog = Arc<Mutex<Vec<Vec<u8>>>>;

#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    response: Vec<u8>,
}

/// A mock [`Transport`].
///
/// `send()` must match the next expectation exactly; its response is then
/// queued for `receive()` behind anything already pushed. With
/// [`close_when_drained`](MockTransport::close_when_drained) set, `receive()`
/// reports [`Error::ConnectionLost`] once every expectation is consumed and
/// every queued byte has been read; otherwise it reports
/// [`Error::Timeout`] when there is nothing to read.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    inbound: VecDeque<Vec<u8>>,
    close_when_drained: bool,
    connected: bool,
    sent: SentLog,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            inbound: VecDeque::new(),
            close_when_drained: false,
            connected: true,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// When `request` is sent, make `response` readable.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Queue bytes the gateway sends unprompted. Each call is delivered by
    /// a separate `receive()` (split further if the read buffer is small).
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.push_back(bytes.to_vec());
    }

    /// Simulate the gateway hanging up once the script is exhausted.
    pub fn close_when_drained(&mut self) {
        self.close_when_drained = true;
    }

    /// Handle to the sent-data log that outlives the boxed transport.
    pub fn sent_log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }

    /// Everything sent so far.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.sent.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if let Ok(mut log) = self.sent.lock() {
            log.push(data.to_vec());
        }

        let Some(expectation) = self.expectations.pop_front() else {
            return Err(Error::Protocol(format!(
                "no more expectations in mock transport, got {:?}",
                String::from_utf8_lossy(data)
            )));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }
        if !expectation.response.is_empty() {
            self.inbound.push_back(expectation.response);
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        match self.inbound.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.inbound.push_front(chunk.split_off(n));
                }
                Ok(n)
            }
            None if self.close_when_drained && self.expectations.is_empty() => {
                Err(Error::ConnectionLost)
            }
            None => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.inbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// A [`Connector`] that hands out pre-built mock transports in order.
///
/// Once the queue is empty every further `connect()` fails with a
/// transport error, like an unreachable gateway.
#[derive(Debug, Default)]
pub struct MockConnector {
    transports: Mutex<VecDeque<MockTransport>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(transports: impl IntoIterator<Item = MockTransport>) -> Self {
        Self {
            transports: Mutex::new(transports.into_iter().collect()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of `connect()` calls so far, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self
            .transports
            .lock()
            .map_err(|_| Error::Transport("mock connector poisoned".into()))?
            .pop_front();
        match next {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(Error::Transport("connection refused: mock gateway".into())),
        }
    }

    fn peer(&self) -> String {
        "mock-gateway".into()
    }
}
