//! The session IO task.
//!
//! One tokio task per session generation owns the transport exclusively. It
//! writes the blocks handed to it through an [`IoWriter`] and, between
//! writes, reads whatever the gateway pushes, decodes complete blocks and
//! hands each one to the [`FrameRouter`].
//!
//! The task ends when the gateway closes the connection, the socket fails,
//! or the session is cancelled. Its [`JoinHandle`] is how the session
//! manager learns that a generation is over.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use smsgate_core::error::{Error, Result};
use smsgate_core::transport::Transport;

use crate::protocol::{self, DecodeResult};
use crate::router::FrameRouter;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How long one idle read waits before the loop re-checks for writes.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// A request sent to the IO task.
pub enum Request {
    /// Write one encoded block.
    Write {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable write handle to a running IO task.
#[derive(Clone)]
pub struct IoWriter {
    tx: mpsc::Sender<Request>,
}

impl IoWriter {
    /// Wrap a raw request channel. Used by tests that stand in for the task.
    pub fn from_sender(tx: mpsc::Sender<Request>) -> Self {
        Self { tx }
    }

    /// Write `bytes` and wait until the task has flushed them.
    ///
    /// Fails with [`Error::NotConnected`] once the task has exited.
    pub async fn write(&self, bytes: Vec<u8>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Write {
                bytes,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        reply_rx.await.map_err(|_| Error::NotConnected)?
    }

    /// `true` once the IO task has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle to the IO task of one session generation.
pub struct SessionIo {
    pub writer: IoWriter,
    pub cancel: CancellationToken,
    pub task: JoinHandle<Result<()>>,
}

impl SessionIo {
    /// Wait for the IO task to finish and report why it stopped.
    ///
    /// `Ok(())` means the task was cancelled; otherwise the error that
    /// ended the read loop (usually [`Error::ConnectionLost`]).
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "session IO task aborted");
                Err(Error::ConnectionLost)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task for one session generation.
pub fn spawn_io_task(transport: Box<dyn Transport>, router: FrameRouter) -> SessionIo {
    let (tx, rx) = mpsc::channel::<Request>(16);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(io_loop(transport, router, rx, cancel.clone()));

    SessionIo {
        writer: IoWriter { tx },
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// Priority order: cancellation, then pending writes, then idle reads.
async fn io_loop(
    mut transport: Box<dyn Transport>,
    router: FrameRouter,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut buf = Vec::new();
    let mut scanned = 0;

    let result = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("session IO task cancelled");
                break Ok(());
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Write { bytes, reply }) => {
                        let result = transport.send(&bytes).await;
                        if let Err(ref e) = result {
                            // The read side notices a dead socket on its own.
                            warn!(error = %e, "write to gateway failed");
                        }
                        let _ = reply.send(result);
                    }
                    None => {
                        debug!("all writers dropped, exiting session IO task");
                        break Ok(());
                    }
                }
            }

            read = read_chunk(&mut *transport) => {
                match read {
                    Ok(Some(chunk)) => {
                        buf.extend_from_slice(&chunk);
                        process_frames(&mut buf, &mut scanned, &router);
                    }
                    Ok(None) => {}
                    Err(e) => break Err(e),
                }
            }
        }
    };

    if let Err(e) = transport.close().await {
        debug!(error = %e, "error closing transport");
    }
    result
}

/// One idle read. `Ok(None)` means nothing arrived within the poll window.
async fn read_chunk(transport: &mut dyn Transport) -> Result<Option<Vec<u8>>> {
    let mut chunk = [0u8; 4096];
    match transport.receive(&mut chunk, IDLE_POLL).await {
        Ok(n) => Ok(Some(chunk[..n].to_vec())),
        Err(Error::Timeout) => {
            // Yield briefly so the loop can check for writes or cancellation.
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(None)
        }
        Err(e) => {
            debug!(error = %e, "session read loop ended");
            Err(e)
        }
    }
}

/// Decode and route every complete block in `buf`, keeping any partial tail.
/// `scanned` carries how much of the tail has already been searched.
fn process_frames(buf: &mut Vec<u8>, scanned: &mut usize, router: &FrameRouter) {
    while let DecodeResult::Frame { frame, consumed } =
        protocol::decode_frame_from(buf, *scanned)
    {
        buf.drain(..consumed);
        *scanned = 0;
        trace!(raw = %frame.raw(), "frame");
        router.route(frame);
    }
    *scanned = buf.len();
}
