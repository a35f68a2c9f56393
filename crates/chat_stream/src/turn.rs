//! StreamTurn - one streamed request/response exchange.
//!
//! The turn owns its lifecycle FSM and its typewriter pacer. It never owns the
//! branch graph: every operation that mutates the conversation takes the graph
//! by `&mut` and reports what the caller has to do next through
//! [`TurnEffects`].

use chat_core::{MessageNode, NodeId, PacerConfig, Role};
use chat_state::{StateMachine, StateTransition, TransitionError, TurnEvent, TurnState};
use variant_graph::BranchGraph;

use crate::channel::{ChannelMessage, StreamRequest, TurnEndpoint};
use crate::error::ChannelError;
use crate::event::{InitPayload, StreamEvent};
use crate::pacer::{TypeTick, TypewriterPacer};

/// How a turn decides which node it attaches under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorPolicy {
    /// Active pivot, then the last visible assistant.
    Fallback,
    /// Exactly this anchor; `None` starts a root-level turn.
    Forced(Option<NodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOptions {
    pub user_text: String,
    pub endpoint: TurnEndpoint,
    pub anchor: AnchorPolicy,
    pub skip_local_echo: bool,
    /// Assistant node a regeneration was started from.
    pub regenerating: Option<NodeId>,
    pub extra_params: Vec<(String, String)>,
}

impl TurnOptions {
    pub fn submit(text: impl Into<String>) -> Self {
        Self {
            user_text: text.into(),
            endpoint: TurnEndpoint::Generate,
            anchor: AnchorPolicy::Fallback,
            skip_local_echo: false,
            regenerating: None,
            extra_params: Vec::new(),
        }
    }

    /// New assistant sibling under `parent`, the user node `assistant_id` answers.
    pub fn regenerate(assistant_id: NodeId, parent: Option<NodeId>) -> Self {
        Self {
            user_text: String::new(),
            endpoint: TurnEndpoint::Regenerate {
                assistant_id: assistant_id.clone(),
            },
            anchor: AnchorPolicy::Forced(parent),
            skip_local_echo: true,
            regenerating: Some(assistant_id),
            extra_params: Vec::new(),
        }
    }

    /// New user sibling of `user_id` carrying `text`, attached under `parent`.
    pub fn edit(user_id: NodeId, parent: Option<NodeId>, text: impl Into<String>) -> Self {
        Self {
            user_text: text.into(),
            endpoint: TurnEndpoint::Edit { user_id },
            anchor: AnchorPolicy::Forced(parent),
            skip_local_echo: false,
            regenerating: None,
            extra_params: Vec::new(),
        }
    }
}

/// Conversation-level values a turn needs when it starts.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub chat_id: String,
    pub temperature: f32,
    pub active_pivot: Option<NodeId>,
}

/// What the owner of a turn must do after feeding it a message or tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnEffects {
    /// Drop the channel stream.
    pub close_channel: bool,
    /// The graph changed; reproject the path.
    pub graph_changed: bool,
    /// Visible assistant text to push to the renderer.
    pub frame: Option<String>,
    /// Set once, when the turn reaches a terminal state.
    pub finished: Option<TurnState>,
}

impl TurnEffects {
    fn close() -> Self {
        Self {
            close_channel: true,
            ..Self::default()
        }
    }

    fn changed() -> Self {
        Self {
            graph_changed: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

pub struct StreamTurn {
    fsm: StateMachine,
    options: TurnOptions,
    pacer: TypewriterPacer,
    anchor: Option<NodeId>,
    temp_user: Option<NodeId>,
    user_id: Option<NodeId>,
    assistant_id: Option<NodeId>,
}

impl StreamTurn {
    pub fn new(options: TurnOptions, pacing: &PacerConfig) -> Self {
        Self {
            fsm: StateMachine::new(),
            options,
            pacer: TypewriterPacer::new(pacing),
            anchor: None,
            temp_user: None,
            user_id: None,
            assistant_id: None,
        }
    }

    pub fn state(&self) -> &TurnState {
        self.fsm.state()
    }

    pub fn history(&self) -> &[StateTransition] {
        self.fsm.history()
    }

    pub fn options(&self) -> &TurnOptions {
        &self.options
    }

    pub fn anchor(&self) -> Option<&NodeId> {
        self.anchor.as_ref()
    }

    /// Optimistic user id, until the server confirms it.
    pub fn temp_user_id(&self) -> Option<&NodeId> {
        self.temp_user.as_ref()
    }

    pub fn user_id(&self) -> Option<&NodeId> {
        self.user_id.as_ref().or(self.temp_user.as_ref())
    }

    pub fn assistant_id(&self) -> Option<&NodeId> {
        self.assistant_id.as_ref()
    }

    pub fn regenerating(&self) -> Option<&NodeId> {
        self.options.regenerating.as_ref()
    }

    pub fn visible_text(&self) -> &str {
        self.pacer.visible()
    }

    pub fn is_finished(&self) -> bool {
        self.fsm.state().is_terminal()
    }

    /// Resolve the anchor, echo the user text optimistically and build the
    /// channel request.
    pub fn start(
        &mut self,
        graph: &mut BranchGraph,
        ctx: &TurnContext,
    ) -> Result<StreamRequest, TransitionError> {
        self.fsm.try_handle_event(TurnEvent::Started)?;

        self.anchor = match &self.options.anchor {
            AnchorPolicy::Forced(anchor) => anchor.clone(),
            // New user messages only attach under assistants.
            AnchorPolicy::Fallback => ctx
                .active_pivot
                .clone()
                .filter(|pivot| graph.node(pivot).is_some_and(|node| node.role() == Role::Assistant))
                .or_else(|| graph.project_path().last_of_role(Role::Assistant).cloned()),
        };

        let text = &self.options.user_text;
        if !text.is_empty() && !self.options.skip_local_echo {
            let temp = NodeId::temporary();
            match graph.insert(MessageNode::user(temp.clone(), self.anchor.clone(), text.as_str())) {
                Ok(_) => {
                    graph.pin_path_to(&temp);
                    self.temp_user = Some(temp);
                }
                Err(error) => {
                    tracing::warn!(%error, anchor = ?self.anchor, "StreamTurn: could not echo user text");
                }
            }
        }

        let mut params = vec![("temperature".to_string(), ctx.temperature.to_string())];
        if !text.is_empty() {
            params.push(("prompt".to_string(), text.clone()));
        }
        if let Some(anchor) = &self.anchor {
            params.push(("from_id".to_string(), anchor.to_string()));
        }
        for (key, value) in &self.options.extra_params {
            params.retain(|(existing, _)| existing != key);
            params.push((key.clone(), value.clone()));
        }

        let request = StreamRequest {
            path: self.options.endpoint.path(&ctx.chat_id),
            params,
        };
        tracing::info!(
            path = %request.path,
            anchor = ?self.anchor,
            temp_user = ?self.temp_user,
            "StreamTurn: started"
        );
        Ok(request)
    }

    pub fn handle_message(&mut self, graph: &mut BranchGraph, message: ChannelMessage) -> TurnEffects {
        match message {
            ChannelMessage::Opened => {
                tracing::debug!("StreamTurn: channel open");
                TurnEffects::default()
            }
            ChannelMessage::Event(event) => self.handle_event(graph, event),
            ChannelMessage::Failed(error) => self.fail_transport(error),
        }
    }

    /// The channel stream ended. Without a prior `done`/`error` this is a
    /// transport failure.
    pub fn channel_ended(&mut self) -> TurnEffects {
        if self.fsm.state().accepts_input() {
            self.fail_transport(ChannelError::Closed)
        } else {
            TurnEffects::default()
        }
    }

    fn handle_event(&mut self, graph: &mut BranchGraph, event: StreamEvent) -> TurnEffects {
        if !self.fsm.state().accepts_input() {
            tracing::debug!(
                kind = event.kind(),
                state = ?self.fsm.state(),
                "StreamTurn: dropping event after input closed"
            );
            return TurnEffects::default();
        }

        match event {
            StreamEvent::Init(payload) => {
                self.fsm.handle_event(TurnEvent::EventReceived);
                self.handle_init(graph, payload)
            }
            StreamEvent::Delta(text) => {
                self.fsm.handle_event(TurnEvent::EventReceived);
                self.append(&text);
                TurnEffects::default()
            }
            StreamEvent::Done(tail) => {
                self.fsm.handle_event(TurnEvent::EventReceived);
                self.append(&tail);
                self.fsm.handle_event(TurnEvent::CompletionReceived);
                self.pacer.finish();
                TurnEffects::close()
            }
            StreamEvent::Error(message) => {
                self.fsm.handle_event(TurnEvent::EventReceived);
                self.fail_server(message)
            }
            StreamEvent::Ignored(kind) => {
                tracing::trace!(kind = %kind, "StreamTurn: ignoring event");
                TurnEffects::default()
            }
        }
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Err(error) = self.pacer.append(text) {
            tracing::warn!(%error, len = text.len(), "StreamTurn: dropping text");
        }
    }

    fn handle_init(&mut self, graph: &mut BranchGraph, payload: InitPayload) -> TurnEffects {
        if let Some(confirmed) = &payload.user_message_id {
            match self.temp_user.clone() {
                Some(temp) => match graph.rebind_id(&temp, confirmed) {
                    Ok(_) => {
                        graph.pin_path_to(confirmed);
                        self.temp_user = None;
                        self.user_id = Some(confirmed.clone());
                    }
                    Err(error) => {
                        tracing::warn!(%error, "StreamTurn: keeping optimistic user id");
                    }
                },
                None if graph.contains(confirmed) => self.user_id = Some(confirmed.clone()),
                None => {}
            }
        }

        let parent = self
            .user_id
            .clone()
            .or_else(|| self.temp_user.clone())
            .or_else(|| {
                payload
                    .assistant_parent_id
                    .clone()
                    .filter(|id| graph.contains(id))
            })
            .or_else(|| {
                self.anchor
                    .clone()
                    .filter(|id| graph.node(id).is_some_and(|node| node.role() == Role::User))
            });

        let (Some(assistant_id), Some(parent)) = (payload.assistant_message_id, parent) else {
            let mut effects = self.fail_server("invalid init payload".to_string());
            effects.graph_changed = true;
            return effects;
        };

        if !graph.contains(&assistant_id) {
            if let Err(error) =
                graph.insert(MessageNode::assistant(assistant_id.clone(), Some(parent), ""))
            {
                tracing::warn!(%error, "StreamTurn: could not insert assistant");
                let mut effects = self.fail_server(error.to_string());
                effects.graph_changed = true;
                return effects;
            }
        }
        graph.pin_path_to(&assistant_id);

        tracing::info!(
            user_id = ?self.user_id,
            assistant_id = %assistant_id,
            "StreamTurn: ids confirmed"
        );
        self.assistant_id = Some(assistant_id);
        TurnEffects::changed()
    }

    fn fail_server(&mut self, message: String) -> TurnEffects {
        tracing::warn!(kind = "server", %message, "StreamTurn: turn failed");
        self.fsm.handle_event(TurnEvent::ServerError { message });
        self.pacer.finish();
        TurnEffects::close()
    }

    fn fail_transport(&mut self, error: ChannelError) -> TurnEffects {
        if !self.fsm.state().accepts_input() {
            return TurnEffects::close();
        }
        tracing::warn!(kind = "transport", %error, "StreamTurn: turn failed");
        self.fsm.handle_event(TurnEvent::TransportError {
            message: error.to_string(),
        });
        self.pacer.finish();
        TurnEffects::close()
    }

    pub fn type_tick(&mut self, graph: &mut BranchGraph) -> TurnEffects {
        match self.pacer.type_tick() {
            TypeTick::Drained if self.fsm.state().is_finalizing() => self.finalize(graph),
            TypeTick::Drained => {
                tracing::warn!(state = ?self.fsm.state(), "StreamTurn: pacer drained before finalizing");
                TurnEffects::default()
            }
            TypeTick::Idle | TypeTick::Advanced => TurnEffects::default(),
        }
    }

    pub fn render_tick(&mut self) -> TurnEffects {
        TurnEffects {
            frame: self.pacer.render_tick(),
            ..TurnEffects::default()
        }
    }

    /// Stop at once: close the channel, drop unrevealed text and keep what is
    /// visible as the final assistant text.
    pub fn cancel(&mut self, graph: &mut BranchGraph) -> TurnEffects {
        if self.is_finished() {
            return TurnEffects::default();
        }
        let kept = self.pacer.cancel();
        tracing::info!(assistant_id = ?self.assistant_id, kept = kept.len(), "StreamTurn: cancelled");
        self.fsm.handle_event(TurnEvent::CancelRequested);
        let mut effects = self.finalize(graph);
        effects.close_channel = true;
        effects
    }

    fn finalize(&mut self, graph: &mut BranchGraph) -> TurnEffects {
        self.fsm.handle_event(TurnEvent::PacerDrained);
        let text = self.pacer.visible().to_string();
        if let Some(assistant_id) = &self.assistant_id {
            graph.set_text(assistant_id, text.as_str());
        }
        let state = self.fsm.state().clone();
        tracing::info!(state = ?state, chars = text.chars().count(), "StreamTurn: finalized");

        TurnEffects {
            close_channel: false,
            graph_changed: true,
            frame: Some(text),
            finished: Some(state),
        }
    }
}
