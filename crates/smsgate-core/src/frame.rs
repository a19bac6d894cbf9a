//! Decoded protocol frames.
//!
//! A [`Frame`] is one blank-line-terminated block received from the gateway.
//! It keeps the `key: value` fields in arrival order, the repeated `Output`
//! values (and bare lines) in a separate list, and the original text.

use std::fmt;

/// Suffix of the output line that terminates a multi-frame `Follows` reply.
pub const END_COMMAND_MARKER: &str = "--END COMMAND--";

/// `Response` value of a reply that continues across subsequent frames.
pub const FOLLOWS: &str = "Follows";

/// `Response` value of the synthetic frame returned when no reply arrives.
pub const TIMEOUT_RESPONSE: &str = "Timeout";

/// `Message` value of the synthetic timeout frame.
pub const TIMEOUT_MESSAGE: &str = "No reply from gateway";

/// One decoded protocol block.
///
/// Field names are case-sensitive as received. Setting a field that already
/// exists overwrites its value in place, so the first-seen ordering holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    fields: Vec<(String, String)>,
    outputs: Vec<String>,
    raw: String,
}

impl Frame {
    /// Create an empty frame carrying the given raw block text.
    pub fn new(raw: impl Into<String>) -> Self {
        Frame {
            fields: Vec::new(),
            outputs: Vec::new(),
            raw: raw.into(),
        }
    }

    /// Build a locally generated reply frame (no raw text).
    pub fn synthetic(response: &str, message: &str, outputs: Vec<String>) -> Self {
        let mut frame = Frame::new(String::new());
        frame.set("Response", response);
        frame.set("Message", message);
        frame.outputs = outputs;
        frame
    }

    /// The reply returned when a command gets no answer within its window.
    pub fn timeout() -> Self {
        Frame::synthetic(TIMEOUT_RESPONSE, TIMEOUT_MESSAGE, Vec::new())
    }

    /// Look up a field by exact name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, overwriting any existing value with the same name.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Append one output line.
    pub fn push_output(&mut self, line: impl Into<String>) {
        self.outputs.push(line.into());
    }

    /// All fields in first-seen order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Output lines in arrival order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// The unparsed block text (empty for synthetic frames).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn response(&self) -> Option<&str> {
        self.get("Response")
    }

    pub fn message(&self) -> Option<&str> {
        self.get("Message")
    }

    pub fn event(&self) -> Option<&str> {
        self.get("Event")
    }

    /// `true` if `Response` is `follows`, compared case-insensitively.
    pub fn is_follows(&self) -> bool {
        self.response()
            .is_some_and(|r| r.eq_ignore_ascii_case(FOLLOWS))
    }

    /// `true` for the synthetic no-reply frame (or a gateway reply that
    /// happens to say `Response: Timeout`).
    pub fn is_timeout(&self) -> bool {
        self.response() == Some(TIMEOUT_RESPONSE)
    }

    /// `true` if any output line ends with the `--END COMMAND--` marker.
    pub fn has_end_marker(&self) -> bool {
        self.outputs
            .iter()
            .any(|line| line.trim_end().ends_with(END_COMMAND_MARKER))
    }
}

/// Operator-facing rendering: `"<Response> — <Message>"` followed by each
/// output line on its own line.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.response().unwrap_or("");
        let message = self.message().unwrap_or("");
        write!(f, "{response} \u{2014} {message}")?;
        for line in &self.outputs {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_in_place() {
        let mut f = Frame::new("");
        f.set("Response", "Success");
        f.set("Message", "ok");
        f.set("Response", "Error");
        assert_eq!(f.response(), Some("Error"));
        assert_eq!(f.fields()[0].0, "Response");
        assert_eq!(f.fields().len(), 2);
    }

    #[test]
    fn field_lookup_is_case_sensitive() {
        let mut f = Frame::new("");
        f.set("response", "Success");
        assert_eq!(f.response(), None);
        assert_eq!(f.get("response"), Some("Success"));
    }

    #[test]
    fn follows_check_ignores_case() {
        let mut f = Frame::new("");
        f.set("Response", "FOLLOWS");
        assert!(f.is_follows());
        f.set("Response", "Success");
        assert!(!f.is_follows());
    }

    #[test]
    fn end_marker_detection() {
        let mut f = Frame::new("");
        f.push_output("line one");
        assert!(!f.has_end_marker());
        f.push_output("--END COMMAND--  ");
        assert!(f.has_end_marker());
    }

    #[test]
    fn timeout_frame_shape() {
        let f = Frame::timeout();
        assert!(f.is_timeout());
        assert_eq!(f.message(), Some("No reply from gateway"));
        assert!(f.outputs().is_empty());
        assert!(f.raw().is_empty());
    }

    #[test]
    fn display_renders_outputs() {
        let f = Frame::synthetic("Follows", "Command output follows", vec![
            "Span 1: up".into(),
            "--END COMMAND--".into(),
        ]);
        assert_eq!(
            f.to_string(),
            "Follows \u{2014} Command output follows\nSpan 1: up\n--END COMMAND--"
        );
    }

    #[test]
    fn display_missing_fields() {
        let f = Frame::new("");
        assert_eq!(f.to_string(), " \u{2014} ");
    }
}
