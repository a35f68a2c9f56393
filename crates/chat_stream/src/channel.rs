//! Server-push channel abstraction.
//!
//! Opening a channel yields a stream of [`ChannelMessage`]s; closing it is
//! dropping the stream.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chat_core::NodeId;
use futures::stream::{self, Stream, StreamExt};

use crate::error::ChannelError;
use crate::event::StreamEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Opened,
    Event(StreamEvent),
    Failed(ChannelError),
}

pub type ChannelStream = Pin<Box<dyn Stream<Item = ChannelMessage> + Send>>;

/// Which server operation a turn streams from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEndpoint {
    Generate,
    Regenerate { assistant_id: NodeId },
    Edit { user_id: NodeId },
}

impl TurnEndpoint {
    pub fn path(&self, chat_id: &str) -> String {
        match self {
            TurnEndpoint::Generate => format!("/chats/{chat_id}/generate/stream"),
            TurnEndpoint::Regenerate { assistant_id } => {
                format!("/chats/{chat_id}/messages/{assistant_id}/regenerate/stream")
            }
            TurnEndpoint::Edit { user_id } => {
                format!("/chats/{chat_id}/messages/{user_id}/edit/stream")
            }
        }
    }
}

/// A channel-open request: a path relative to the API base plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl StreamRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Opens server-push channels.
pub trait ChannelFactory: Send + Sync {
    fn open(&self, request: StreamRequest) -> ChannelStream;
}

/// Replays prepared message sequences, one per `open()`, and records every
/// request it was asked to open. Once the scripts run out, opened channels
/// stay silent.
#[derive(Clone, Default)]
pub struct ScriptedChannelFactory {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<StreamRequest>>>,
}

struct Script {
    messages: Vec<ChannelMessage>,
    /// Keep the channel open after the last message instead of ending it.
    hold_open: bool,
}

impl ScriptedChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue messages for the next `open()`; the channel ends after them.
    pub fn push_script(&self, messages: Vec<ChannelMessage>) {
        self.push(Script {
            messages,
            hold_open: false,
        });
    }

    /// Queue messages for the next `open()`; the channel then stays open.
    pub fn push_open_script(&self, messages: Vec<ChannelMessage>) {
        self.push(Script {
            messages,
            hold_open: true,
        });
    }

    fn push(&self, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push_back(script);
        }
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl ChannelFactory for ScriptedChannelFactory {
    fn open(&self, request: StreamRequest) -> ChannelStream {
        tracing::debug!(path = %request.path, "ScriptedChannel: open");
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.pop_front());
        match script {
            Some(Script {
                messages,
                hold_open: false,
            }) => Box::pin(stream::iter(messages)),
            Some(Script {
                messages,
                hold_open: true,
            }) => Box::pin(stream::iter(messages).chain(stream::pending())),
            None => Box::pin(stream::pending()),
        }
    }
}
