//! Classification of inbound server-push events.

use chat_core::NodeId;
use serde_json::Value;

/// Ids confirmed by the server when a turn starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitPayload {
    pub user_message_id: Option<NodeId>,
    pub assistant_message_id: Option<NodeId>,
    pub assistant_parent_id: Option<NodeId>,
}

impl InitPayload {
    fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(NodeId::from_json);
        Self {
            user_message_id: field("user_message_id"),
            assistant_message_id: field("assistant_message_id"),
            assistant_parent_id: field("assistant_parent_id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Init(InitPayload),
    Delta(String),
    /// Final fragment, possibly empty.
    Done(String),
    Error(String),
    /// Any other event type; carries the type name for logging.
    Ignored(String),
}

impl StreamEvent {
    /// Classify one SSE message.
    ///
    /// When `data` is a JSON object its `type` field decides the kind, falling
    /// back to the SSE event name. Text fragments come from the payload's
    /// `data` field, or from the raw data when it is not JSON.
    pub fn classify(event_name: &str, data: &str) -> Self {
        match serde_json::from_str::<Value>(data) {
            Ok(value @ Value::Object(_)) => Self::from_value(event_name, &value),
            Ok(Value::String(text)) => Self::from_text(event_name, text),
            _ => Self::from_text(event_name, data.to_string()),
        }
    }

    fn from_value(event_name: &str, value: &Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(event_name);
        let text = || match value.get("data") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        match kind {
            "init" => StreamEvent::Init(InitPayload::from_value(value)),
            "delta" => StreamEvent::Delta(text()),
            "done" => StreamEvent::Done(text()),
            "error" => StreamEvent::Error(error_message(value)),
            other => StreamEvent::Ignored(other.to_string()),
        }
    }

    fn from_text(event_name: &str, text: String) -> Self {
        match event_name {
            "delta" => StreamEvent::Delta(text),
            "done" => StreamEvent::Done(text),
            "error" => StreamEvent::Error(text),
            // "message" is the SSE default name for unnamed events
            other => StreamEvent::Ignored(other.to_string()),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::Init(_) => "init",
            StreamEvent::Delta(_) => "delta",
            StreamEvent::Done(_) => "done",
            StreamEvent::Error(_) => "error",
            StreamEvent::Ignored(kind) => kind,
        }
    }
}

fn error_message(value: &Value) -> String {
    ["message", "error", "data"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_json_payloads_by_type_field() {
        let init = StreamEvent::classify(
            "message",
            r#"{"type":"init","user_message_id":5,"assistant_message_id":"6","assistant_parent_id":null}"#,
        );
        assert_eq!(
            init,
            StreamEvent::Init(InitPayload {
                user_message_id: Some(NodeId::from("5")),
                assistant_message_id: Some(NodeId::from("6")),
                assistant_parent_id: None,
            })
        );

        assert_eq!(
            StreamEvent::classify("message", r#"{"type":"delta","data":"Hel"}"#),
            StreamEvent::Delta("Hel".to_string())
        );
        assert_eq!(
            StreamEvent::classify("message", r#"{"type":"done"}"#),
            StreamEvent::Done(String::new())
        );
    }

    #[test]
    fn falls_back_to_event_name_and_raw_data() {
        assert_eq!(
            StreamEvent::classify("delta", "plain text"),
            StreamEvent::Delta("plain text".to_string())
        );
        assert_eq!(
            StreamEvent::classify("done", r#""quoted tail""#),
            StreamEvent::Done("quoted tail".to_string())
        );
        assert_eq!(
            StreamEvent::classify("init", r#"{"user_message_id":1,"assistant_message_id":2}"#).kind(),
            "init"
        );
    }

    #[test]
    fn error_messages_are_extracted() {
        assert_eq!(
            StreamEvent::classify("message", r#"{"type":"error","message":"quota exceeded"}"#),
            StreamEvent::Error("quota exceeded".to_string())
        );
        match StreamEvent::classify("message", r#"{"type":"error","code":42}"#) {
            StreamEvent::Error(message) => assert!(message.contains("42")),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn unknown_types_are_ignored() {
        assert_eq!(
            StreamEvent::classify("message", r#"{"type":"ping"}"#),
            StreamEvent::Ignored("ping".to_string())
        );
        assert_eq!(
            StreamEvent::classify("message", "keepalive"),
            StreamEvent::Ignored("message".to_string())
        );
    }
}
