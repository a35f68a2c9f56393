use chat_core::{NodeId, Role};
use chat_state::TransitionError;
use chat_stream::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Pick a conversation first.")]
    NoActiveChat,

    #[error("message text is empty")]
    EmptyMessage,

    #[error("unknown message {0}")]
    UnknownNode(NodeId),

    #[error("message {node} is not a {expected} message")]
    WrongRole { node: NodeId, expected: Role },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("session actor shut down")]
    Shutdown,
}
