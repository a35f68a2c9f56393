//! `chat_session` orchestrates turns over a branching conversation: it owns
//! the branch graph and the single running turn, decides where new turns
//! attach, routes UI actions and publishes the visible path.

pub mod actions;
pub mod actor;
pub mod error;
pub mod render;
pub mod session;
pub mod view;

pub use actions::{ActionOutcome, UiAction};
pub use actor::{spawn_session, SessionHandle};
pub use error::SessionError;
pub use render::{MarkupRenderer, PlainText};
pub use session::{ChatSession, TurnInput};
pub use view::{SessionUpdate, VisibleNode};
