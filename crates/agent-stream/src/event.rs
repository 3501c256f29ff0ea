use std::fmt;

use serde_json::{Map, Value};

use crate::frame::DATA_PREFIX;

/// Payload that ends a response stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Text shown when a payload carries none of the content fields.
pub const NO_CONTENT: &str = "no content";

/// Category of a rendered fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Model,
    Tool,
    Result,
    Error,
    /// Missing or unrecognized `type`; rendered with a neutral label.
    Unknown,
}

impl FragmentKind {
    /// Maps a payload `type` value onto a kind.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("model") => Self::Model,
            Some("tool") => Self::Tool,
            Some("result") => Self::Result,
            Some("error") => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Tool => "tool",
            Self::Result => "result",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Label placed before the fragment in the panel.
    pub fn label(self) -> &'static str {
        match self {
            Self::Model => "🤖 Model:",
            Self::Tool => "🔧 Tool:",
            Self::Result => "✅ Final result:",
            Self::Error => "❌ Error:",
            Self::Unknown => "• Message:",
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A displayable piece of the agent's response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl Fragment {
    pub fn new(kind: FragmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Decoded unit of the response stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Fragment(Fragment),
    /// Terminal marker; carries no text.
    Done,
}

/// Fields searched for displayable text, highest priority first.
const CONTENT_FIELDS: [&str; 4] = ["content", "result", "tool_result", "msg"];

fn content_text(object: &Map<String, Value>) -> Option<String> {
    CONTENT_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .find(|value| !value.is_null())
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
}

/// Decodes one SSE record into an [`Event`].
///
/// Never fails: a payload that is not a JSON object becomes an `error`
/// fragment describing the problem.
pub fn decode(record: &str) -> Event {
    let payload = record
        .trim_start()
        .strip_prefix(DATA_PREFIX)
        .unwrap_or(record)
        .trim();
    if payload == DONE_SENTINEL {
        return Event::Done;
    }

    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(err) => return parse_failure(err),
    };
    let Some(object) = value.as_object() else {
        return parse_failure(format!("expected a JSON object, got `{payload}`"));
    };

    let kind = FragmentKind::from_tag(object.get("type").and_then(Value::as_str));
    let text = content_text(object)
        .map(|text| text.trim_start().to_string())
        .unwrap_or_else(|| NO_CONTENT.to_string());
    Event::Fragment(Fragment { kind, text })
}

fn parse_failure(err: impl fmt::Display) -> Event {
    tracing::debug!(error = %err, "undecodable stream record");
    Event::Fragment(Fragment::new(
        FragmentKind::Error,
        format!("failed to parse stream data: {err}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(record: &str) -> Fragment {
        match decode(record) {
            Event::Fragment(fragment) => fragment,
            Event::Done => panic!("unexpected done for {record}"),
        }
    }

    #[test]
    fn done_sentinel_is_terminal() {
        assert_eq!(decode("data: [DONE]"), Event::Done);
        assert_eq!(decode("data:[DONE]\r"), Event::Done);
    }

    #[test]
    fn content_fields_are_tried_in_priority_order() {
        let f = fragment(r#"data: {"type":"model","content":"Hi","result":"ignored"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Model, "Hi"));
        let f = fragment(r#"data: {"type":"result","result":"Done","msg":"ignored"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Result, "Done"));
        let f = fragment(r#"data: {"type":"error","msg":"boom"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Error, "boom"));
        let f = fragment(r#"data: {"type":"tool","content":null,"tool_result":"x"}"#);
        assert_eq!(f.text, "x");
    }

    #[test]
    fn only_leading_whitespace_is_trimmed() {
        let f = fragment(r#"data: {"type":"tool","tool_result":"  42\n"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Tool, "42\n"));
    }

    #[test]
    fn malformed_payload_becomes_error_fragment() {
        let f = fragment("data: {not json");
        assert_eq!(f.kind, FragmentKind::Error);
        assert!(f.text.starts_with("failed to parse stream data:"));
        assert!(f.text.len() > "failed to parse stream data: ".len());
    }

    #[test]
    fn non_object_payload_is_a_decode_error() {
        assert_eq!(fragment("data: 42").kind, FragmentKind::Error);
        let f = fragment(r#"data: ["model","hi"]"#);
        assert_eq!(f.kind, FragmentKind::Error);
        assert!(f.text.starts_with("failed to parse stream data:"));
    }

    #[test]
    fn non_string_type_is_an_unknown_category() {
        let f = fragment(r#"data: {"type":5,"content":"hello"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Unknown, "hello"));
        let f = fragment(r#"data: {"type":true,"msg":"flag"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Unknown, "flag"));
    }

    #[test]
    fn duplicate_keys_keep_the_last_value() {
        let f = fragment(r#"data: {"type":"model","content":"first","content":"second"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Model, "second"));
    }

    #[test]
    fn missing_content_and_unknown_type_fall_back() {
        let f = fragment(r#"data: {"type":"thinking"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Unknown, NO_CONTENT));
        let f = fragment(r#"data: {"content":"plain"}"#);
        assert_eq!(f, Fragment::new(FragmentKind::Unknown, "plain"));
    }

    #[test]
    fn non_string_content_is_rendered_as_json() {
        let f = fragment(r#"data: {"type":"tool","content":{"temp":21}}"#);
        assert_eq!(f.text, r#"{"temp":21}"#);
    }
}
