//! Reading stored conversations and recorded event streams.

use std::path::Path;

use anyhow::{bail, Context};
use chat_core::MessageRecord;
use chat_stream::{ChannelMessage, StreamEvent};
use serde_json::Value;

/// Records from a file holding either a bare array or the server envelope
/// `{ "status": ..., "data": [...], "message": ... }`.
pub fn read_conversation(path: &Path) -> anyhow::Result<Vec<MessageRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading conversation {}", path.display()))?;
    parse_conversation(&content).with_context(|| format!("parsing {}", path.display()))
}

fn parse_conversation(content: &str) -> anyhow::Result<Vec<MessageRecord>> {
    let value: Value = serde_json::from_str(content)?;
    let data = match value {
        Value::Array(_) => value,
        Value::Object(mut envelope) => {
            if envelope.get("status").and_then(Value::as_str) == Some("error") {
                let message = envelope
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(chat_stream::api::DEFAULT_FETCH_ERROR);
                bail!("{message}");
            }
            envelope.remove("data").unwrap_or(Value::Array(Vec::new()))
        }
        other => bail!("expected an array of messages, found {other}"),
    };
    Ok(serde_json::from_value(data)?)
}

/// A recorded channel: one SSE data payload per line. Blank lines and lines
/// starting with `#` are skipped.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<ChannelMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading events {}", path.display()))?;
    Ok(parse_events(&content))
}

fn parse_events(content: &str) -> Vec<ChannelMessage> {
    std::iter::once(ChannelMessage::Opened)
        .chain(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(|line| ChannelMessage::Event(StreamEvent::classify("message", line))),
        )
        .collect()
}
