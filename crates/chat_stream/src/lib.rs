//! `chat_stream` runs one streamed generation turn: it classifies inbound
//! server-push events, paces the arriving text through a typewriter, and
//! applies the turn's effects to the branch graph.

pub mod api;
pub mod channel;
pub mod error;
pub mod event;
pub mod pacer;
pub mod sse;
pub mod timers;
pub mod turn;

pub use api::{ChatSummary, ConversationApi, HttpConversationApi};
pub use channel::{
    ChannelFactory, ChannelMessage, ChannelStream, ScriptedChannelFactory, StreamRequest,
    TurnEndpoint,
};
pub use error::{ApiError, ChannelError, PacerError};
pub use event::{InitPayload, StreamEvent};
pub use pacer::{TypeTick, TypewriterPacer};
pub use sse::SseChannelFactory;
pub use timers::{TimerTick, TurnTimers};
pub use turn::{AnchorPolicy, StreamTurn, TurnContext, TurnEffects, TurnOptions};
