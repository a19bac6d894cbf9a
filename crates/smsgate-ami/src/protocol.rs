//! Wire framing for the gateway's manager interface.
//!
//! The gateway speaks CRLF-terminated `Key: Value` lines grouped into blocks;
//! a blank line (`\r\n\r\n`) ends each block. Decoding is best-effort: any
//! byte sequence produces a frame, invalid UTF-8 is replaced, and lines
//! without a colon are kept as output.

use bytes::{BufMut, BytesMut};
use smsgate_core::Frame;

/// The blank line that terminates every block.
pub const DELIMITER: &[u8] = b"\r\n\r\n";

/// Result of attempting to decode one block from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete block was decoded.
    Frame {
        frame: Frame,
        /// Bytes consumed from the input, delimiter included.
        consumed: usize,
    },

    /// No delimiter yet. More data is needed.
    Incomplete,
}

/// Decode the first complete block in `buf`.
///
/// # Example
///
/// ```
/// use smsgate_ami::protocol::{DecodeResult, decode_frame};
///
/// let buf = b"Response: Success\r\nMessage: ok\r\n\r\nEvent: Par";
/// match decode_frame(buf) {
///     DecodeResult::Frame { frame, consumed } => {
///         assert_eq!(frame.response(), Some("Success"));
///         assert_eq!(consumed, 34);
///     }
///     DecodeResult::Incomplete => unreachable!(),
/// }
/// assert_eq!(decode_frame(b"Event: Par"), DecodeResult::Incomplete);
/// ```
pub fn decode_frame(buf: &[u8]) -> DecodeResult {
    decode_frame_from(buf, 0)
}

/// Like [`decode_frame`], but the first `scanned` bytes are already known to
/// hold no delimiter, so the search resumes near the end of them.
///
/// A read loop passes the buffer length seen at its last `Incomplete`, which
/// keeps a large block arriving in many reads from being rescanned each time.
pub fn decode_frame_from(buf: &[u8], scanned: usize) -> DecodeResult {
    // A delimiter may straddle the old end of the buffer.
    let start = scanned.saturating_sub(DELIMITER.len() - 1).min(buf.len());
    let Some(pos) = buf[start..]
        .windows(DELIMITER.len())
        .position(|w| w == DELIMITER)
        .map(|p| p + start)
    else {
        return DecodeResult::Incomplete;
    };

    let text = String::from_utf8_lossy(&buf[..pos]);
    DecodeResult::Frame {
        frame: parse_block(&text),
        consumed: pos + DELIMITER.len(),
    }
}

/// Parse one block of text (without its delimiter) into a [`Frame`].
///
/// Each line with a colon is split on the first colon and both halves are
/// trimmed. `Output` keys (any case) append to the output list, other keys
/// set the field. Non-blank lines without a colon are collected as bare
/// output and placed after the `Output` values.
pub fn parse_block(text: &str) -> Frame {
    let mut frame = Frame::new(text);
    let mut bare = Vec::new();

    for line in text.lines() {
        match line.split_once(':') {
            Some((key, value)) => {
                let key = key.trim();
                let value = value.trim();
                if key.eq_ignore_ascii_case("output") {
                    frame.push_output(value);
                } else {
                    frame.set(key, value);
                }
            }
            None => {
                let line = line.trim();
                if !line.is_empty() {
                    bare.push(line.to_string());
                }
            }
        }
    }

    for line in bare {
        frame.push_output(line);
    }
    frame
}

/// Encode the login block.
///
/// ```
/// use smsgate_ami::protocol::encode_login;
///
/// assert_eq!(
///     encode_login("admin", "pw"),
///     b"Action: Login\r\nUsername: admin\r\nSecret: pw\r\n\r\n"
/// );
/// ```
pub fn encode_login(username: &str, secret: &str) -> Vec<u8> {
    encode_action("Login", &[("Username", username), ("Secret", secret)])
}

/// Encode a gateway CLI command as an `smscommand` action.
///
/// ```
/// use smsgate_ami::protocol::encode_command;
///
/// assert_eq!(
///     encode_command("gsm show spans"),
///     b"Action: smscommand\r\ncommand: gsm show spans\r\n\r\n"
/// );
/// ```
pub fn encode_command(command: &str) -> Vec<u8> {
    encode_action("smscommand", &[("command", command)])
}

fn encode_action(action: &str, fields: &[(&str, &str)]) -> Vec<u8> {
    let capacity = 16
        + action.len()
        + fields
            .iter()
            .map(|(k, v)| k.len() + v.len() + 4)
            .sum::<usize>();
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_slice(b"Action: ");
    buf.put_slice(action.as_bytes());
    buf.put_slice(b"\r\n");
    for (key, value) in fields {
        buf.put_slice(key.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"\r\n");
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(buf: &mut Vec<u8>) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let DecodeResult::Frame { frame, consumed } = decode_frame(buf) {
            buf.drain(..consumed);
            frames.push(frame);
        }
        frames
    }

    // -----------------------------------------------------------------------
    // decode_frame
    // -----------------------------------------------------------------------

    #[test]
    fn incomplete_without_delimiter() {
        assert_eq!(decode_frame(b""), DecodeResult::Incomplete);
        assert_eq!(decode_frame(b"Response: Success\r\n"), DecodeResult::Incomplete);
        assert_eq!(decode_frame(b"Response: Success\r\n\r"), DecodeResult::Incomplete);
    }

    #[test]
    fn consumes_exactly_one_block() {
        let buf = b"Response: Success\r\n\r\nResponse: Error\r\n\r\n";
        match decode_frame(buf) {
            DecodeResult::Frame { frame, consumed } => {
                assert_eq!(frame.response(), Some("Success"));
                assert_eq!(&buf[consumed..], b"Response: Error\r\n\r\n");
            }
            DecodeResult::Incomplete => panic!("expected a frame"),
        }
    }

    #[test]
    fn small_chunks_yield_every_block_in_order() {
        let stream = b"Response: Success\r\nMessage: one\r\n\r\n\
Event: ReceivedSMS\r\nSender: 100\r\nContent: hi\r\n\r\n\
Response: Follows\r\nOutput: a\r\nOutput: b\r\n\r\n";

        for chunk_size in [1, 2, 3, 7, 64] {
            let mut buf = Vec::new();
            let mut frames = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                buf.extend_from_slice(chunk);
                frames.extend(decode_all(&mut buf));
            }
            assert!(buf.is_empty(), "chunk size {chunk_size} left bytes");
            assert_eq!(frames.len(), 3, "chunk size {chunk_size}");
            assert_eq!(frames[0].message(), Some("one"));
            assert_eq!(frames[1].event(), Some("ReceivedSMS"));
            assert_eq!(frames[2].outputs(), ["a", "b"]);
        }
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let buf = b"Response: Success\r\nMessage: caf\xe9\r\n\r\n";
        match decode_frame(buf) {
            DecodeResult::Frame { frame, .. } => {
                assert_eq!(frame.message(), Some("caf\u{fffd}"));
            }
            DecodeResult::Incomplete => panic!("expected a frame"),
        }
    }

    #[test]
    fn keeps_raw_text() {
        let buf = b"Response: Success\r\nMessage: ok\r\n\r\n";
        match decode_frame(buf) {
            DecodeResult::Frame { frame, .. } => {
                assert_eq!(frame.raw(), "Response: Success\r\nMessage: ok");
            }
            DecodeResult::Incomplete => panic!("expected a frame"),
        }
    }

    #[test]
    fn resumed_scan_finds_straddling_delimiter() {
        let mut buf = b"Response: Success\r\n\r".to_vec();
        assert_eq!(decode_frame_from(&buf, 0), DecodeResult::Incomplete);
        let scanned = buf.len();

        buf.extend_from_slice(b"\nResponse: Error\r\n\r\n");
        match decode_frame_from(&buf, scanned) {
            DecodeResult::Frame { frame, consumed } => {
                assert_eq!(frame.response(), Some("Success"));
                assert_eq!(consumed, 21);
            }
            DecodeResult::Incomplete => panic!("expected a frame"),
        }
    }

    #[test]
    fn resumed_scan_past_end_is_incomplete() {
        assert_eq!(decode_frame_from(b"abc", 100), DecodeResult::Incomplete);
    }

    // -----------------------------------------------------------------------
    // parse_block
    // -----------------------------------------------------------------------

    #[test]
    fn splits_on_first_colon_and_trims() {
        let f = parse_block("Recvtime:  2024-05-01 10:22:33 \r\nSender:+1555");
        assert_eq!(f.get("Recvtime"), Some("2024-05-01 10:22:33"));
        assert_eq!(f.get("Sender"), Some("+1555"));
    }

    #[test]
    fn output_key_any_case_collects_in_order() {
        let f = parse_block("Response: Follows\r\nOutput: one\r\noutput: two\r\nOUTPUT: three");
        assert_eq!(f.outputs(), ["one", "two", "three"]);
        assert_eq!(f.get("output"), None);
    }

    #[test]
    fn repeated_field_overwrites() {
        let f = parse_block("Message: first\r\nMessage: second");
        assert_eq!(f.message(), Some("second"));
        assert_eq!(f.fields().len(), 1);
    }

    #[test]
    fn bare_lines_follow_output_values() {
        let f = parse_block(
            "Response: Follows\r\nPrivilege: Command\r\nspan 1 up\r\nOutput: first\r\n\r\n  \r\n--END COMMAND--",
        );
        assert_eq!(f.outputs(), ["first", "span 1 up", "--END COMMAND--"]);
        assert!(f.has_end_marker());
    }

    #[test]
    fn empty_block_is_empty_frame() {
        let f = parse_block("");
        assert!(f.fields().is_empty());
        assert!(f.outputs().is_empty());
    }

    // -----------------------------------------------------------------------
    // encoders
    // -----------------------------------------------------------------------

    #[test]
    fn login_encoding() {
        assert_eq!(
            encode_login("u", "p"),
            b"Action: Login\r\nUsername: u\r\nSecret: p\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn command_encoding_passes_text_through() {
        assert_eq!(
            encode_command("gsm send sms 1 +1555 hi%20there"),
            b"Action: smscommand\r\ncommand: gsm send sms 1 +1555 hi%20there\r\n\r\n".to_vec()
        );
    }
}
