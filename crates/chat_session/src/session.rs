//! ChatSession - the turn orchestrator.
//!
//! Owns the branch graph, the active pivot and the single running turn. All
//! mutation happens through `&mut self`, so one task drives a session at a
//! time; [`crate::actor`] wraps it for concurrent callers.

use std::sync::Arc;

use chat_core::{ClientConfig, Direction, MessageRecord, NodeId, Role};
use chat_state::TurnState;
use chat_stream::{
    ChannelFactory, ChannelMessage, ChannelStream, ConversationApi, StreamTurn, TimerTick,
    TurnContext, TurnEffects, TurnOptions, TurnTimers,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use variant_graph::{BranchGraph, NodeSeed, PathDiff, ProjectedPath};

use crate::actions::{ActionOutcome, UiAction};
use crate::error::SessionError;
use crate::render::{MarkupRenderer, PlainText};
use crate::view::{SessionUpdate, VisibleNode};

/// Something the running turn is waiting for.
#[derive(Debug)]
pub enum TurnInput {
    /// `None` when the channel stream ended.
    Message(Option<ChannelMessage>),
    Tick(TimerTick),
}

/// The running turn with the resources it owns. Dropping it closes the
/// channel and stops both timers.
struct ActiveTurn {
    turn: StreamTurn,
    channel: Option<ChannelStream>,
    timers: TurnTimers,
}

pub struct ChatSession {
    config: ClientConfig,
    channels: Arc<dyn ChannelFactory>,
    renderer: Box<dyn MarkupRenderer>,
    updates: Option<mpsc::UnboundedSender<SessionUpdate>>,

    chat_id: Option<String>,
    graph: BranchGraph,
    active_pivot: Option<NodeId>,
    current_assistant: Option<NodeId>,
    turn: Option<ActiveTurn>,
    last_outcome: Option<TurnState>,
    last_path: ProjectedPath,
}

impl ChatSession {
    pub fn new(config: ClientConfig, channels: Arc<dyn ChannelFactory>) -> Self {
        Self {
            config,
            channels,
            renderer: Box::new(PlainText),
            updates: None,
            chat_id: None,
            graph: BranchGraph::new(),
            active_pivot: None,
            current_assistant: None,
            turn: None,
            last_outcome: None,
            last_path: ProjectedPath::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: impl MarkupRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Receive [`SessionUpdate`]s from now on. Replaces an earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.updates = Some(tx);
        rx
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn graph(&self) -> &BranchGraph {
        &self.graph
    }

    pub fn active_pivot(&self) -> Option<&NodeId> {
        self.active_pivot.as_ref()
    }

    pub fn current_assistant(&self) -> Option<&NodeId> {
        self.current_assistant.as_ref()
    }

    pub fn has_active_turn(&self) -> bool {
        self.turn.is_some()
    }

    pub fn turn_state(&self) -> Option<&TurnState> {
        self.turn.as_ref().map(|active| active.turn.state())
    }

    /// Terminal state of the most recent finished turn.
    pub fn last_outcome(&self) -> Option<&TurnState> {
        self.last_outcome.as_ref()
    }

    // ========== Loading ==========

    /// Select the conversation new turns are sent to. Stops a running turn.
    pub fn open_chat(&mut self, chat_id: impl Into<String>) {
        self.teardown_turn();
        let chat_id = chat_id.into();
        if self.chat_id.as_deref() != Some(chat_id.as_str()) {
            self.current_assistant = None;
            self.active_pivot = None;
        }
        self.chat_id = Some(chat_id);
    }

    /// Replace the graph with a stored conversation, clear the pin and anchor
    /// new turns at the last visible assistant.
    pub fn load_conversation(&mut self, records: &[MessageRecord]) {
        self.teardown_turn();

        let current = self.current_assistant.clone();
        let seeds = records.iter().map(|record| {
            let mut seed = NodeSeed::from(record);
            seed.current = current.as_ref() == Some(&record.id);
            seed
        });

        self.graph.set_pinned_leaf(None);
        self.graph.rebuild(seeds);
        if current.as_ref().is_some_and(|id| !self.graph.contains(id)) {
            self.current_assistant = None;
        }
        self.active_pivot = self.last_visible_assistant();

        tracing::info!(
            chat_id = ?self.chat_id,
            records = records.len(),
            nodes = self.graph.len(),
            pivot = ?self.active_pivot,
            "ChatSession: conversation loaded"
        );
        self.publish_path();
    }

    /// Fetch a conversation and load it.
    pub async fn load_from(
        &mut self,
        api: &dyn ConversationApi,
        chat_id: &str,
    ) -> Result<(), SessionError> {
        let records = api.fetch_messages(chat_id).await.map_err(|error| {
            tracing::error!(chat_id, %error, "ChatSession: failed to load conversation");
            error
        })?;
        self.open_chat(chat_id);
        self.load_conversation(&records);
        Ok(())
    }

    // ========== User operations ==========

    pub fn submit(&mut self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.start_turn(TurnOptions::submit(text))
    }

    /// Stream a new assistant sibling of `node_id`.
    pub fn regenerate(&mut self, node_id: &NodeId) -> Result<(), SessionError> {
        let parent = self.parent_of(node_id, Role::Assistant)?;
        self.active_pivot = Some(node_id.clone());
        self.graph.pin_path_to(node_id);
        self.start_turn(TurnOptions::regenerate(node_id.clone(), parent))
    }

    /// Branch a user message: a new user sibling carrying `text`, answered by a
    /// fresh assistant reply. The original message stays reachable.
    pub fn edit_and_branch(&mut self, node_id: &NodeId, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let parent = self.parent_of(node_id, Role::User)?;
        self.active_pivot = parent.clone();
        self.start_turn(TurnOptions::edit(node_id.clone(), parent, text))
    }

    /// Switch `node_id`'s group to the neighbouring variant and re-pin to it.
    /// Unknown ids and single-variant groups are a no-op.
    pub fn step_variant(&mut self, node_id: &NodeId, direction: Direction) -> NodeId {
        let next = self.graph.step_variant(node_id, direction);
        if &next != node_id {
            self.active_pivot = self.last_visible_assistant().or_else(|| Some(next.clone()));
            self.publish_path();
        }
        next
    }

    /// Stop the running turn, keeping its visible text. Returns `false` when
    /// nothing was running.
    pub fn cancel_active_turn(&mut self) -> bool {
        self.teardown_turn()
    }

    pub fn visible_path(&self) -> Vec<VisibleNode> {
        let path = self.graph.project_path();
        self.view_of(&path)
    }

    pub fn handle_action(&mut self, action: UiAction) -> Result<ActionOutcome, SessionError> {
        tracing::debug!(action = action.name(), "ChatSession: handling action");
        match action {
            UiAction::SetPivot { node_id } => {
                if self.role_of(&node_id) != Some(Role::Assistant) {
                    return Ok(ActionOutcome::Ignored);
                }
                self.current_assistant = Some(node_id.clone());
                self.active_pivot = Some(node_id);
                self.publish_path();
                Ok(ActionOutcome::Done)
            }
            UiAction::VariantPrev { node_id } => Ok(self.switch(&node_id, Direction::Previous)),
            UiAction::VariantNext { node_id } => Ok(self.switch(&node_id, Direction::Next)),
            UiAction::ArrowKey(direction) => {
                let target = self
                    .graph
                    .project_path()
                    .first_navigable()
                    .map(|step| step.node_id.clone());
                match target {
                    Some(node_id) => Ok(self.switch(&node_id, direction)),
                    None => Ok(ActionOutcome::Ignored),
                }
            }
            UiAction::Regenerate { node_id } => match self.role_of(&node_id) {
                Some(Role::Assistant) => self.regenerate(&node_id).map(|()| ActionOutcome::Done),
                _ => Ok(ActionOutcome::Ignored),
            },
            UiAction::EditSave { node_id, text } => match self.role_of(&node_id) {
                Some(Role::User) => self
                    .edit_and_branch(&node_id, &text)
                    .map(|()| ActionOutcome::Done),
                _ => Ok(ActionOutcome::Ignored),
            },
            UiAction::Copy { node_id } => Ok(self
                .display_text(&node_id)
                .map_or(ActionOutcome::Ignored, ActionOutcome::Copied)),
        }
    }

    fn switch(&mut self, node_id: &NodeId, direction: Direction) -> ActionOutcome {
        if !self.graph.contains(node_id) {
            return ActionOutcome::Ignored;
        }
        ActionOutcome::Switched(self.step_variant(node_id, direction))
    }

    // ========== Turn driving ==========

    /// Wait for whatever the running turn needs next. `None` when no turn runs.
    pub async fn next_turn_input(&mut self) -> Option<TurnInput> {
        let active = self.turn.as_mut()?;
        let input = match active.channel.as_mut() {
            Some(channel) => tokio::select! {
                message = channel.next() => TurnInput::Message(message),
                tick = active.timers.next() => TurnInput::Tick(tick),
            },
            None => TurnInput::Tick(active.timers.next().await),
        };
        Some(input)
    }

    pub fn apply_turn_input(&mut self, input: TurnInput) {
        let Some(active) = self.turn.as_mut() else {
            return;
        };
        let effects = match input {
            TurnInput::Message(Some(message)) => active.turn.handle_message(&mut self.graph, message),
            TurnInput::Message(None) => {
                active.channel = None;
                active.turn.channel_ended()
            }
            TurnInput::Tick(TimerTick::Type) => active.turn.type_tick(&mut self.graph),
            TurnInput::Tick(TimerTick::Render) => active.turn.render_tick(),
        };
        self.apply_effects(effects);
    }

    /// Process one input of the running turn. Returns `false` when no turn runs.
    pub async fn step(&mut self) -> bool {
        match self.next_turn_input().await {
            Some(input) => {
                self.apply_turn_input(input);
                true
            }
            None => false,
        }
    }

    /// Drive the running turn to a terminal state. A turn whose channel never
    /// completes keeps this pending.
    pub async fn run_until_idle(&mut self) -> Option<TurnState> {
        while self.step().await {}
        self.last_outcome.clone()
    }

    fn start_turn(&mut self, options: TurnOptions) -> Result<(), SessionError> {
        let chat_id = self.chat_id.clone().ok_or(SessionError::NoActiveChat)?;
        self.teardown_turn();

        let ctx = TurnContext {
            chat_id,
            temperature: self.config.temperature,
            active_pivot: self
                .active_pivot
                .clone()
                .or_else(|| self.current_assistant.clone()),
        };
        let mut turn = StreamTurn::new(options, &self.config.pacer);
        let request = turn.start(&mut self.graph, &ctx)?;
        let channel = self.channels.open(request);

        self.turn = Some(ActiveTurn {
            turn,
            channel: Some(channel),
            timers: TurnTimers::new(&self.config.pacer),
        });
        self.publish_path();
        Ok(())
    }

    /// Cancel and drop the running turn, if any.
    fn teardown_turn(&mut self) -> bool {
        let Some(mut active) = self.turn.take() else {
            return false;
        };
        let effects = active.turn.cancel(&mut self.graph);
        let assistant_id = active.turn.assistant_id().cloned();
        drop(active);

        if let Some(text) = effects.frame {
            self.publish_frame(assistant_id.clone(), text);
        }
        if let Some(state) = effects.finished {
            self.finish(state, assistant_id);
        }
        true
    }

    fn apply_effects(&mut self, effects: TurnEffects) {
        let assistant_id = self
            .turn
            .as_ref()
            .and_then(|active| active.turn.assistant_id().cloned());

        if effects.close_channel {
            if let Some(active) = self.turn.as_mut() {
                active.channel = None;
            }
        }
        if let Some(text) = effects.frame {
            self.publish_frame(assistant_id.clone(), text);
        }
        if let Some(state) = effects.finished {
            self.turn = None;
            self.finish(state, assistant_id);
        } else if effects.graph_changed {
            if assistant_id.is_some() {
                self.active_pivot = assistant_id;
            }
            self.publish_path();
        }
    }

    fn finish(&mut self, state: TurnState, assistant_id: Option<NodeId>) {
        tracing::info!(state = ?state, assistant_id = ?assistant_id, "ChatSession: turn finished");
        if assistant_id.is_some() {
            self.active_pivot = assistant_id.clone();
        }
        self.last_outcome = Some(state.clone());
        self.publish_path();
        self.publish(SessionUpdate::TurnFinished {
            state,
            assistant_id,
        });
    }

    // ========== Views ==========

    fn view_of(&self, path: &ProjectedPath) -> Vec<VisibleNode> {
        let running = self.turn.as_ref().map(|active| &active.turn);
        path.steps
            .iter()
            .map(|step| {
                let streaming =
                    running.is_some_and(|turn| turn.assistant_id() == Some(&step.node_id));
                let regenerating =
                    running.is_some_and(|turn| turn.regenerating() == Some(&step.node_id));
                let display_text = match running {
                    Some(turn) if streaming => turn.visible_text().to_string(),
                    _ => self
                        .graph
                        .node(&step.node_id)
                        .map(|node| node.text().to_string())
                        .unwrap_or_default(),
                };
                VisibleNode {
                    node_id: step.node_id.clone(),
                    role: step.role,
                    markup: self.renderer.render(&display_text),
                    display_text,
                    variant_position: step.variant_position,
                    variant_total: step.variant_total,
                    streaming,
                    regenerating,
                    current: self.current_assistant.as_ref() == Some(&step.node_id),
                }
            })
            .collect()
    }

    fn display_text(&self, node_id: &NodeId) -> Option<String> {
        let node = self.graph.node(node_id)?;
        let running = self.turn.as_ref().map(|active| &active.turn);
        Some(match running {
            Some(turn) if turn.assistant_id() == Some(node_id) => turn.visible_text().to_string(),
            _ => node.text().to_string(),
        })
    }

    fn last_visible_assistant(&self) -> Option<NodeId> {
        self.graph
            .project_path()
            .last_of_role(Role::Assistant)
            .cloned()
    }

    fn role_of(&self, node_id: &NodeId) -> Option<Role> {
        self.graph.node(node_id).map(|node| node.role())
    }

    fn parent_of(&self, node_id: &NodeId, expected: Role) -> Result<Option<NodeId>, SessionError> {
        let node = self
            .graph
            .node(node_id)
            .ok_or_else(|| SessionError::UnknownNode(node_id.clone()))?;
        if node.role() != expected {
            return Err(SessionError::WrongRole {
                node: node_id.clone(),
                expected,
            });
        }
        Ok(node.parent_id().cloned())
    }

    // ========== Publishing ==========

    fn publish(&self, update: SessionUpdate) {
        if let Some(tx) = &self.updates {
            if tx.send(update).is_err() {
                tracing::trace!("ChatSession: update receiver dropped");
            }
        }
    }

    fn publish_frame(&self, node_id: Option<NodeId>, text: String) {
        let markup = self.renderer.render(&text);
        self.publish(SessionUpdate::TextFrame {
            node_id,
            text,
            markup,
        });
    }

    fn publish_path(&mut self) {
        let path = self.graph.project_path();
        let diff = PathDiff::between(&self.last_path, &path);
        let nodes = self.view_of(&path);
        tracing::debug!(
            len = path.len(),
            kept = diff.common_prefix,
            added = diff.added.len(),
            "ChatSession: path projected"
        );
        self.last_path = path;
        self.publish(SessionUpdate::PathChanged { nodes, diff });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_stream::ScriptedChannelFactory;

    fn record(json: serde_json::Value) -> MessageRecord {
        serde_json::from_value(json).unwrap()
    }

    fn loaded_session() -> (ChatSession, ScriptedChannelFactory) {
        let factory = ScriptedChannelFactory::new();
        let mut session = ChatSession::new(ClientConfig::default(), Arc::new(factory.clone()));
        session.open_chat("1");
        session.load_conversation(&[
            record(serde_json::json!({"id": 1, "role": "user", "content": [{"value": "hi"}], "parent_id": null})),
            record(serde_json::json!({"id": 2, "role": "assistant", "content": [{"value": "one"}], "parent_id": 1})),
            record(serde_json::json!({"id": 3, "role": "assistant", "content": [{"value": "two"}], "parent_id": 1})),
        ]);
        (session, factory)
    }

    #[test]
    fn load_sets_pivot_to_last_visible_assistant() {
        let (session, _) = loaded_session();
        assert_eq!(session.active_pivot(), Some(&NodeId::from("3")));
        let path = session.visible_path();
        assert_eq!(path.len(), 2);
        assert_eq!((path[1].variant_position, path[1].variant_total), (2, 2));
    }

    #[test]
    fn submit_requires_chat_and_text() {
        let factory = ScriptedChannelFactory::new();
        let mut session = ChatSession::new(ClientConfig::default(), Arc::new(factory));
        assert!(matches!(session.submit("hi"), Err(SessionError::NoActiveChat)));

        let (mut session, _) = loaded_session();
        assert!(matches!(session.submit("   "), Err(SessionError::EmptyMessage)));
    }

    #[test]
    fn regenerate_checks_role() {
        let (mut session, _) = loaded_session();
        assert!(matches!(
            session.regenerate(&NodeId::from("1")),
            Err(SessionError::WrongRole { .. })
        ));
        assert!(matches!(
            session.regenerate(&NodeId::from("404")),
            Err(SessionError::UnknownNode(_))
        ));
        assert_eq!(
            session
                .handle_action(UiAction::Regenerate {
                    node_id: NodeId::from("1")
                })
                .unwrap(),
            ActionOutcome::Ignored
        );
    }

    #[test]
    fn set_pivot_marks_current_and_survives_reload() {
        let (mut session, _) = loaded_session();
        session
            .handle_action(UiAction::SetPivot {
                node_id: NodeId::from("2"),
            })
            .unwrap();
        assert_eq!(session.current_assistant(), Some(&NodeId::from("2")));
        assert!(!session.visible_path()[1].current);

        // the current marker wins over the default on rebuild
        let records: Vec<MessageRecord> = vec![
            record(serde_json::json!({"id": 1, "role": "user", "content": [{"value": "hi"}]})),
            record(serde_json::json!({"id": 2, "role": "assistant", "content": [{"value": "one"}], "parent_id": 1})),
            record(serde_json::json!({"id": 3, "role": "assistant", "content": [{"value": "two"}], "parent_id": 1})),
        ];
        session.load_conversation(&records);
        let path = session.visible_path();
        assert_eq!(path[1].node_id, NodeId::from("2"));
        assert!(path[1].current);
    }

    #[tokio::test]
    async fn set_pivot_ignores_user_messages() {
        let (mut session, factory) = loaded_session();
        assert_eq!(
            session
                .handle_action(UiAction::SetPivot {
                    node_id: NodeId::from("1"),
                })
                .unwrap(),
            ActionOutcome::Ignored
        );
        assert_eq!(session.current_assistant(), None);
        assert_eq!(session.active_pivot(), Some(&NodeId::from("3")));

        session.submit("next").unwrap();
        assert_eq!(factory.requests()[0].param("from_id"), Some("3"));
        let path = session.visible_path();
        assert_eq!(path.len(), 3);
        assert_eq!(path[2].role, Role::User);
        assert_eq!(path[2].display_text, "next");
    }

    #[test]
    fn switching_chats_drops_the_current_marker() {
        let (mut session, _) = loaded_session();
        session
            .handle_action(UiAction::SetPivot {
                node_id: NodeId::from("2"),
            })
            .unwrap();

        session.open_chat("1");
        assert_eq!(session.current_assistant(), Some(&NodeId::from("2")));

        session.open_chat("other");
        assert_eq!(session.current_assistant(), None);
        assert_eq!(session.active_pivot(), None);
        session.load_conversation(&[
            record(serde_json::json!({"id": 1, "role": "user", "content": [{"value": "hi"}]})),
            record(serde_json::json!({"id": 2, "role": "assistant", "content": [{"value": "one"}], "parent_id": 1})),
            record(serde_json::json!({"id": 3, "role": "assistant", "content": [{"value": "two"}], "parent_id": 1})),
        ]);
        let path = session.visible_path();
        assert_eq!(path[1].node_id, NodeId::from("3"));
        assert!(!path[1].current);
    }

    #[test]
    fn copy_and_arrow_keys() {
        let (mut session, _) = loaded_session();
        assert_eq!(
            session
                .handle_action(UiAction::Copy {
                    node_id: NodeId::from("3")
                })
                .unwrap(),
            ActionOutcome::Copied("two".to_string())
        );
        assert_eq!(
            session
                .handle_action(UiAction::ArrowKey(Direction::Previous))
                .unwrap(),
            ActionOutcome::Switched(NodeId::from("2"))
        );
        assert_eq!(session.active_pivot(), Some(&NodeId::from("2")));
        assert_eq!(
            session
                .handle_action(UiAction::Copy {
                    node_id: NodeId::from("nope")
                })
                .unwrap(),
            ActionOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn new_turn_cancels_the_running_one() {
        let (mut session, factory) = loaded_session();
        let mut updates = session.subscribe();

        session.submit("first").unwrap();
        assert!(session.has_active_turn());
        session.submit("second").unwrap();

        assert_eq!(factory.requests().len(), 2);
        assert_eq!(session.last_outcome(), Some(&TurnState::Cancelled));

        let mut finished = 0;
        while let Ok(update) = updates.try_recv() {
            if let SessionUpdate::TurnFinished { state, .. } = update {
                assert_eq!(state, TurnState::Cancelled);
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
    }
}
