//! Command submission and reply correlation.
//!
//! The wire carries no request identifiers, so [`CommandExchange`] allows a
//! single command in flight: a mutex around the current session's link is
//! held from the write until the reply (or its absence) is settled. The next
//! reply frame on the session's queue is taken to be the answer.
//!
//! `Follows` replies are paginated; continuation frames are pulled and their
//! output appended until an `--END COMMAND--` line, a quiet queue, or the
//! caller's deadline.

use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use smsgate_core::error::{Error, Result};
use smsgate_core::frame::{FOLLOWS, Frame};

use crate::io::IoWriter;
use crate::protocol;

/// Default wait for the first reply to a command.
pub const DEFAULT_COMMAND_WAIT: Duration = Duration::from_secs(4);

/// Default wait for each continuation frame of a `Follows` reply.
pub const DEFAULT_FOLLOW_TIMEOUT: Duration = Duration::from_secs(1);

/// The write side and reply queue of one session generation.
pub struct SessionLink {
    writer: IoWriter,
    replies: mpsc::UnboundedReceiver<Frame>,
    generation: u64,
}

impl SessionLink {
    pub fn new(writer: IoWriter, replies: mpsc::UnboundedReceiver<Frame>, generation: u64) -> Self {
        Self {
            writer,
            replies,
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn write(&self, bytes: Vec<u8>) -> Result<()> {
        self.writer.write(bytes).await
    }

    /// `true` once the session's IO task has exited.
    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }

    /// Next reply frame, or `None` on timeout or once the session is gone.
    pub async fn next_reply(&mut self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.replies.recv())
            .await
            .ok()
            .flatten()
    }

    /// Drop replies nobody is waiting for (e.g. late answers to a command
    /// that already timed out). Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(frame) = self.replies.try_recv() {
            trace!(generation = self.generation, raw = %frame.raw(), "dropping stale reply");
            dropped += 1;
        }
        dropped
    }
}

/// Serializes commands over whichever session is current.
pub struct CommandExchange {
    slot: Mutex<Option<SessionLink>>,
    follow_timeout: Duration,
}

impl CommandExchange {
    pub fn new(follow_timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            follow_timeout,
        }
    }

    /// Make `link` the current session. Any previous link, with its queue,
    /// is dropped.
    pub async fn install(&self, link: SessionLink) {
        let generation = link.generation;
        *self.slot.lock().await = Some(link);
        debug!(generation, "command exchange attached to session");
    }

    /// Detach from the current session, discarding its reply queue.
    pub async fn clear(&self) {
        if let Some(link) = self.slot.lock().await.take() {
            debug!(generation = link.generation, "command exchange detached");
        }
    }

    /// Issue `command` and wait up to `wait` for its reply.
    ///
    /// Returns [`Error::NotConnected`] when no session is attached or the
    /// write cannot be delivered. A missing reply is not an error: the
    /// result is the synthetic `Timeout` frame.
    pub async fn send_command(&self, command: &str, wait: Duration) -> Result<Frame> {
        let mut slot = self.slot.lock().await;
        let link = slot.as_mut().ok_or(Error::NotConnected)?;

        let stale = link.discard_pending();
        if stale > 0 {
            debug!(generation = link.generation, stale, "discarded unclaimed replies");
        }

        let deadline = Instant::now() + wait;
        if let Err(e) = link.write(protocol::encode_command(command)).await {
            warn!(generation = link.generation, command, error = %e, "command write failed");
            return Err(Error::NotConnected);
        }
        trace!(generation = link.generation, command, "command sent");

        let Some(first) = link.next_reply(remaining(deadline)).await else {
            debug!(generation = link.generation, command, "no reply within window");
            return Ok(Frame::timeout());
        };
        if !first.is_follows() {
            return Ok(first);
        }

        let message = first.message().unwrap_or_default().to_string();
        let mut outputs = first.outputs().to_vec();
        let mut finished = first.has_end_marker();
        let mut pages: u32 = 1;

        while !finished {
            let left = remaining(deadline);
            if left.is_zero() {
                debug!(generation = link.generation, command, "follows reply hit deadline");
                break;
            }
            match link.next_reply(self.follow_timeout.min(left)).await {
                Some(frame) => {
                    finished = frame.has_end_marker();
                    outputs.extend(frame.outputs().iter().cloned());
                    pages += 1;
                }
                None => {
                    debug!(generation = link.generation, command, "follows reply went quiet");
                    break;
                }
            }
        }

        trace!(
            generation = link.generation,
            command,
            pages,
            lines = outputs.len(),
            "follows reply assembled"
        );
        Ok(Frame::synthetic(FOLLOWS, &message, outputs))
    }

    /// `true` while a session is attached.
    pub async fn is_attached(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

impl Default for CommandExchange {
    fn default() -> Self {
        Self::new(DEFAULT_FOLLOW_TIMEOUT)
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
