//! Single-task session actor.
//!
//! One tokio task owns the [`ChatSession`] and multiplexes caller commands
//! with the running turn's channel events and pacer ticks, so every graph
//! mutation happens on that task in arrival order.
//!
//! ```text
//!   SessionHandle (Clone)      mpsc       session task
//!   ┌──────────────────┐   ────────▶   ┌──────────────────────────────┐
//!   │ .submit()        │               │ ChatSession                  │
//!   │ .regenerate()    │   ◀────────   │ select! { command, turn io } │
//!   │ .visible_path()  │    oneshot    │                              │
//!   └──────────────────┘               └──────────────────────────────┘
//! ```

use chat_core::{Direction, MessageRecord, NodeId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::actions::{ActionOutcome, UiAction};
use crate::error::SessionError;
use crate::session::{ChatSession, TurnInput};
use crate::view::VisibleNode;

enum SessionCommand {
    Load {
        chat_id: String,
        records: Vec<MessageRecord>,
        reply: oneshot::Sender<()>,
    },
    Submit {
        text: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Regenerate {
        node_id: NodeId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    EditAndBranch {
        node_id: NodeId,
        text: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    StepVariant {
        node_id: NodeId,
        direction: Direction,
        reply: oneshot::Sender<NodeId>,
    },
    Action {
        action: UiAction,
        reply: oneshot::Sender<Result<ActionOutcome, SessionError>>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    VisiblePath {
        reply: oneshot::Sender<Vec<VisibleNode>>,
    },
}

enum Wake {
    Command(Option<SessionCommand>),
    Turn(TurnInput),
}

/// Cloneable handle to a running session task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| SessionError::Shutdown)?;
        rx.await.map_err(|_| SessionError::Shutdown)
    }

    pub async fn load_conversation(
        &self,
        chat_id: &str,
        records: Vec<MessageRecord>,
    ) -> Result<(), SessionError> {
        let chat_id = chat_id.to_string();
        self.call(|reply| SessionCommand::Load {
            chat_id,
            records,
            reply,
        })
        .await
    }

    pub async fn submit(&self, text: &str) -> Result<(), SessionError> {
        let text = text.to_string();
        self.call(|reply| SessionCommand::Submit { text, reply })
            .await?
    }

    pub async fn regenerate(&self, node_id: &NodeId) -> Result<(), SessionError> {
        let node_id = node_id.clone();
        self.call(|reply| SessionCommand::Regenerate { node_id, reply })
            .await?
    }

    pub async fn edit_and_branch(&self, node_id: &NodeId, text: &str) -> Result<(), SessionError> {
        let node_id = node_id.clone();
        let text = text.to_string();
        self.call(|reply| SessionCommand::EditAndBranch {
            node_id,
            text,
            reply,
        })
        .await?
    }

    pub async fn step_variant(
        &self,
        node_id: &NodeId,
        direction: Direction,
    ) -> Result<NodeId, SessionError> {
        let node_id = node_id.clone();
        self.call(|reply| SessionCommand::StepVariant {
            node_id,
            direction,
            reply,
        })
        .await
    }

    pub async fn action(&self, action: UiAction) -> Result<ActionOutcome, SessionError> {
        self.call(|reply| SessionCommand::Action { action, reply })
            .await?
    }

    pub async fn cancel_active_turn(&self) -> Result<bool, SessionError> {
        self.call(|reply| SessionCommand::Cancel { reply }).await
    }

    pub async fn visible_path(&self) -> Result<Vec<VisibleNode>, SessionError> {
        self.call(|reply| SessionCommand::VisiblePath { reply }).await
    }
}

/// Move `session` onto its own task. The task ends, returning the session,
/// once every handle is dropped.
pub fn spawn_session(session: ChatSession) -> (SessionHandle, JoinHandle<ChatSession>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(session, rx));
    (SessionHandle { tx }, task)
}

async fn run(
    mut session: ChatSession,
    mut rx: mpsc::UnboundedReceiver<SessionCommand>,
) -> ChatSession {
    tracing::debug!("SessionActor: started");
    loop {
        let wake = tokio::select! {
            command = rx.recv() => Wake::Command(command),
            Some(input) = session.next_turn_input() => Wake::Turn(input),
        };
        match wake {
            Wake::Command(Some(command)) => handle_command(&mut session, command),
            Wake::Command(None) => break,
            Wake::Turn(input) => session.apply_turn_input(input),
        }
    }
    session.cancel_active_turn();
    tracing::debug!("SessionActor: stopped");
    session
}

fn handle_command(session: &mut ChatSession, command: SessionCommand) {
    // A dropped reply receiver only means the caller stopped waiting.
    match command {
        SessionCommand::Load {
            chat_id,
            records,
            reply,
        } => {
            session.open_chat(chat_id);
            session.load_conversation(&records);
            let _ = reply.send(());
        }
        SessionCommand::Submit { text, reply } => {
            let _ = reply.send(session.submit(&text));
        }
        SessionCommand::Regenerate { node_id, reply } => {
            let _ = reply.send(session.regenerate(&node_id));
        }
        SessionCommand::EditAndBranch {
            node_id,
            text,
            reply,
        } => {
            let _ = reply.send(session.edit_and_branch(&node_id, &text));
        }
        SessionCommand::StepVariant {
            node_id,
            direction,
            reply,
        } => {
            let _ = reply.send(session.step_variant(&node_id, direction));
        }
        SessionCommand::Action { action, reply } => {
            let _ = reply.send(session.handle_action(action));
        }
        SessionCommand::Cancel { reply } => {
            let _ = reply.send(session.cancel_active_turn());
        }
        SessionCommand::VisiblePath { reply } => {
            let _ = reply.send(session.visible_path());
        }
    }
}
