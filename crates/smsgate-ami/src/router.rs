//! Frame classification and dispatch.
//!
//! Every decoded frame is either an inbound SMS event, a reply destined for
//! the command exchange, or noise. SMS events go to the application's
//! [`SmsHandler`] on a task of their own, so a slow or failing handler never
//! stalls the read loop.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, trace};

use smsgate_core::error::Result;
use smsgate_core::events::{GatewayEvent, SmsMessage};
use smsgate_core::frame::Frame;

/// `Event` value of an inbound SMS notification.
pub const RECEIVED_SMS_EVENT: &str = "ReceivedSMS";

/// Application callback for inbound SMS.
#[async_trait]
pub trait SmsHandler: Send + Sync + 'static {
    async fn on_sms(&self, sms: SmsMessage) -> Result<()>;
}

/// Any `Fn(SmsMessage) -> impl Future<Output = Result<()>>` is a handler.
#[async_trait]
impl<F, Fut> SmsHandler for F
where
    F: Fn(SmsMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn on_sms(&self, sms: SmsMessage) -> Result<()> {
        (self)(sms).await
    }
}

/// Where a frame should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Sms(SmsMessage),
    Reply,
    Discard,
}

/// Classify a frame.
pub fn classify(frame: &Frame) -> Route {
    if frame.event() == Some(RECEIVED_SMS_EVENT) {
        return Route::Sms(sms_from_frame(frame));
    }
    if frame.response().is_some() || frame.message().is_some() || !frame.outputs().is_empty() {
        return Route::Reply;
    }
    Route::Discard
}

fn sms_from_frame(frame: &Frame) -> SmsMessage {
    // An empty primary value counts as missing.
    let field = |primary: &str, fallback: Option<&str>| {
        frame
            .get(primary)
            .filter(|v| !v.is_empty())
            .or_else(|| fallback.and_then(|k| frame.get(k)))
            .unwrap_or_default()
            .to_string()
    };

    SmsMessage {
        sender: field("Sender", None),
        sim_port: field("GsmPort", Some("Port")),
        timestamp: field("Recvtime", Some("Time")),
        text: decode_content(frame.get("Content").unwrap_or_default()),
    }
}

/// Percent-decode an SMS body, falling back to the raw value when the
/// decoded bytes are not valid UTF-8.
///
/// ```
/// use smsgate_ami::router::decode_content;
///
/// assert_eq!(decode_content("Hello%20World"), "Hello World");
/// assert_eq!(decode_content("%FF%FE"), "%FF%FE");
/// ```
pub fn decode_content(raw: &str) -> String {
    match percent_decode_str(raw).decode_utf8() {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Routes frames from the read loop.
///
/// Owned by the session IO task of one session generation; the reply sender
/// dies with it, which closes that generation's reply queue.
pub struct FrameRouter {
    replies: mpsc::UnboundedSender<Frame>,
    handler: Option<Arc<dyn SmsHandler>>,
    event_tx: broadcast::Sender<GatewayEvent>,
}

impl FrameRouter {
    pub fn new(
        replies: mpsc::UnboundedSender<Frame>,
        handler: Option<Arc<dyn SmsHandler>>,
        event_tx: broadcast::Sender<GatewayEvent>,
    ) -> Self {
        Self {
            replies,
            handler,
            event_tx,
        }
    }

    /// Route one frame. Never fails.
    pub fn route(&self, frame: Frame) {
        match classify(&frame) {
            Route::Sms(sms) => self.dispatch_sms(sms),
            Route::Reply => {
                trace!(response = ?frame.response(), "reply frame queued");
                // The exchange may have gone away mid-teardown.
                let _ = self.replies.send(frame);
            }
            Route::Discard => {
                trace!(raw = %frame.raw(), "discarding unclassified frame");
            }
        }
    }

    fn dispatch_sms(&self, sms: SmsMessage) {
        trace!(sender = %sms.sender, sim = %sms.sim_port, "inbound sms");
        let _ = self.event_tx.send(GatewayEvent::SmsReceived(sms.clone()));

        let Some(handler) = self.handler.clone() else {
            return;
        };
        let sender = sms.sender.clone();
        let task = tokio::spawn(async move { handler.on_sms(sms).await });

        // A handler panic surfaces as a JoinError here instead of unwinding
        // into the read loop.
        tokio::spawn(async move {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(sender = %sender, error = %e, "sms handler failed"),
                Err(e) => error!(sender = %sender, error = %e, "sms handler panicked"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_block;
    use smsgate_core::Error;
    use std::time::Duration;

    fn router_with(
        handler: Option<Arc<dyn SmsHandler>>,
    ) -> (
        FrameRouter,
        mpsc::UnboundedReceiver<Frame>,
        broadcast::Receiver<GatewayEvent>,
    ) {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = broadcast::channel(16);
        (FrameRouter::new(reply_tx, handler, event_tx), reply_rx, event_rx)
    }

    // -----------------------------------------------------------------------
    // classify
    // -----------------------------------------------------------------------

    #[test]
    fn received_sms_decodes_content() {
        let frame = parse_block(
            "Event: ReceivedSMS\r\nSender: +15550001\r\nGsmPort: 2\r\nRecvtime: 2024-05-01 10:22:33\r\nContent: Hello%20World",
        );
        match classify(&frame) {
            Route::Sms(sms) => {
                assert_eq!(sms.text, "Hello World");
                assert_eq!(sms.sender, "+15550001");
                assert_eq!(sms.sim_port, "2");
                assert_eq!(sms.timestamp, "2024-05-01 10:22:33");
            }
            other => panic!("expected Sms, got {other:?}"),
        }
    }

    #[test]
    fn received_sms_field_fallbacks() {
        let frame = parse_block("Event: ReceivedSMS\r\nSender: 100\r\nPort: 3\r\nTime: noon");
        match classify(&frame) {
            Route::Sms(sms) => {
                assert_eq!(sms.sim_port, "3");
                assert_eq!(sms.timestamp, "noon");
                assert_eq!(sms.text, "");
            }
            other => panic!("expected Sms, got {other:?}"),
        }
    }

    #[test]
    fn empty_primary_fields_fall_back() {
        let frame = parse_block(
            "Event: ReceivedSMS\r\nSender: 100\r\nGsmPort:\r\nPort: 3\r\nRecvtime: \r\nTime: noon\r\nContent: x",
        );
        match classify(&frame) {
            Route::Sms(sms) => {
                assert_eq!(sms.sim_port, "3");
                assert_eq!(sms.timestamp, "noon");
            }
            other => panic!("expected Sms, got {other:?}"),
        }
    }

    #[test]
    fn replies_and_noise() {
        assert_eq!(classify(&parse_block("Response: Success")), Route::Reply);
        assert_eq!(classify(&parse_block("Message: hi")), Route::Reply);
        assert_eq!(classify(&parse_block("Output: line")), Route::Reply);
        assert_eq!(classify(&parse_block("bare line")), Route::Reply);
        assert_eq!(
            classify(&parse_block("Event: FullyBooted\r\nPrivilege: system,all")),
            Route::Discard
        );
    }

    #[test]
    fn undecodable_content_falls_back_to_raw() {
        assert_eq!(decode_content("bad%C3%28"), "bad%C3%28");
        assert_eq!(decode_content("100%25"), "100%");
        assert_eq!(decode_content("trailing%2"), "trailing%2");
    }

    // -----------------------------------------------------------------------
    // FrameRouter
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reply_frames_are_queued_in_order() {
        let (router, mut replies, _events) = router_with(None);
        router.route(parse_block("Response: Success\r\nMessage: one"));
        router.route(parse_block("Event: Other"));
        router.route(parse_block("Response: Success\r\nMessage: two"));

        assert_eq!(replies.recv().await.unwrap().message(), Some("one"));
        assert_eq!(replies.recv().await.unwrap().message(), Some("two"));
        assert!(replies.try_recv().is_err());
    }

    #[tokio::test]
    async fn sms_reaches_handler_and_subscribers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn SmsHandler> = Arc::new(move |sms: SmsMessage| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(sms);
                Ok::<(), Error>(())
            }
        });
        let (router, mut replies, mut events) = router_with(Some(handler));

        router.route(parse_block(
            "Event: ReceivedSMS\r\nSender: 42\r\nGsmPort: 1\r\nContent: hi%21",
        ));

        let sms = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sms.text, "hi!");
        assert!(matches!(
            events.recv().await.unwrap(),
            GatewayEvent::SmsReceived(ref m) if m.sender == "42"
        ));
        assert!(replies.try_recv().is_err());
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_routing() {
        let handler: Arc<dyn SmsHandler> = Arc::new(|_sms: SmsMessage| async {
            Err::<(), Error>(Error::Protocol("handler exploded".into()))
        });
        let (router, mut replies, _events) = router_with(Some(handler));

        router.route(parse_block("Event: ReceivedSMS\r\nSender: 1\r\nContent: x"));
        router.route(parse_block("Response: Success"));

        let frame = tokio::time::timeout(Duration::from_secs(1), replies.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.response(), Some("Success"));
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let handler: Arc<dyn SmsHandler> = Arc::new(|sms: SmsMessage| async move {
            if sms.sender == "1" {
                panic!("handler panic");
            }
            Ok::<(), Error>(())
        });
        let (router, mut replies, _events) = router_with(Some(handler));

        router.route(parse_block("Event: ReceivedSMS\r\nSender: 1\r\nContent: x"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        router.route(parse_block("Response: Success"));

        assert!(replies.recv().await.is_some());
    }

    #[test]
    fn closed_reply_queue_is_swallowed() {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(4);
        let router = FrameRouter::new(reply_tx, None, event_tx);
        drop(reply_rx);
        router.route(parse_block("Response: Success"));
    }
}
