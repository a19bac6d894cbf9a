//! Outbound SMS submission.
//!
//! Gateway firmware revisions disagree on the CLI syntax for sending an SMS,
//! so every send issues three variants in turn and returns all three replies
//! without judging them:
//!
//! 1. `gsm send sms <sim> <number> <percent-encoded text>`
//! 2. `sms send <sim> <number> <percent-encoded text>`
//! 3. `gsm send sms <sim> <number> "<text with " replaced by '>"`

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use smsgate_core::error::Result;
use smsgate_core::frame::Frame;

use crate::exchange::{CommandExchange, DEFAULT_COMMAND_WAIT};

/// Everything except `A-Z a-z 0-9 _ . - ~ /` is escaped.
const SMS_TEXT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Percent-encode an SMS body (UTF-8 bytes, uppercase hex).
///
/// ```
/// use smsgate_ami::sms::encode_sms_text;
///
/// assert_eq!(encode_sms_text("hi there/now"), "hi%20there/now");
/// assert_eq!(encode_sms_text("ü"), "%C3%BC");
/// ```
pub fn encode_sms_text(text: &str) -> String {
    utf8_percent_encode(text, SMS_TEXT).to_string()
}

/// The three command variants for one SMS, in the order they are issued.
pub fn build_sms_commands(number: &str, text: &str, sim: u32) -> [String; 3] {
    let encoded = encode_sms_text(text);
    let quoted = text.replace('"', "'");
    [
        format!("gsm send sms {sim} {number} {encoded}"),
        format!("sms send {sim} {number} {encoded}"),
        format!("gsm send sms {sim} {number} \"{quoted}\""),
    ]
}

/// Issues SMS send requests through the shared [`CommandExchange`].
#[derive(Clone)]
pub struct SmsSubmitter {
    exchange: Arc<CommandExchange>,
    wait: Duration,
}

impl SmsSubmitter {
    pub fn new(exchange: Arc<CommandExchange>) -> Self {
        Self {
            exchange,
            wait: DEFAULT_COMMAND_WAIT,
        }
    }

    /// Override the per-command reply window.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Issue all three variants sequentially and return the raw replies.
    ///
    /// Fails with [`Error::NotConnected`](smsgate_core::Error::NotConnected)
    /// if the session is down at any point.
    pub async fn send(&self, number: &str, text: &str, sim: u32) -> Result<Vec<Frame>> {
        let mut replies = Vec::with_capacity(3);
        for command in build_sms_commands(number, text, sim) {
            let reply = self.exchange.send_command(&command, self.wait).await?;
            debug!(number, sim, response = ?reply.response(), "sms variant issued");
            replies.push(reply);
        }
        Ok(replies)
    }
}
