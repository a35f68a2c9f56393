mod input;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use chat_core::{ClientConfig, NodeId};
use chat_session::{spawn_session, ChatSession, SessionHandle};
use chat_state::TurnState;
use chat_stream::{
    ChannelFactory, ConversationApi, HttpConversationApi, ScriptedChannelFactory,
    SseChannelFactory,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "branch-chat")]
#[command(about = "Branching chat client: browse variants and stream turns")]
#[command(version)]
struct Cli {
    /// Config file (.json or .toml) instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    api_base: Option<String>,

    #[arg(long, global = true)]
    token: Option<String>,

    /// Enable debug mode
    #[arg(long, short, global = true, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the visible path of a stored conversation
    Show {
        /// JSON array of messages, or a server envelope
        conversation: PathBuf,
    },
    /// Drive one turn against a recorded event stream
    Replay {
        conversation: PathBuf,
        /// One SSE data payload per line
        events: PathBuf,
        #[arg(long, default_value = "local")]
        chat: String,
        #[arg(long, conflicts_with_all = ["regenerate", "edit"])]
        submit: Option<String>,
        /// Assistant node to regenerate
        #[arg(long, conflicts_with = "edit")]
        regenerate: Option<String>,
        /// User node to edit; requires --text
        #[arg(long, requires = "text")]
        edit: Option<String>,
        #[arg(long)]
        text: Option<String>,
    },
    /// List the conversations stored on the server
    List,
    /// Load a conversation from the server and stream a reply
    Live {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        message: String,
    },
}

enum TurnRequest {
    Submit(String),
    Regenerate(NodeId),
    Edit(NodeId, String),
}

impl TurnRequest {
    fn from_flags(
        submit: Option<String>,
        regenerate: Option<String>,
        edit: Option<String>,
        text: Option<String>,
    ) -> anyhow::Result<Self> {
        match (submit, regenerate, edit) {
            (Some(text), None, None) => Ok(Self::Submit(text)),
            (None, Some(id), None) => Ok(Self::Regenerate(NodeId::from(id))),
            (None, None, Some(id)) => {
                let text = text.ok_or_else(|| anyhow!("--edit needs --text"))?;
                Ok(Self::Edit(NodeId::from(id), text))
            }
            _ => bail!("choose one of --submit, --regenerate or --edit"),
        }
    }

    async fn send(self, handle: &SessionHandle) -> anyhow::Result<()> {
        match self {
            Self::Submit(text) => handle.submit(&text).await?,
            Self::Regenerate(id) => handle.regenerate(&id).await?,
            Self::Edit(id, text) => handle.edit_and_branch(&id, &text).await?,
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ClientConfig::from_file(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => ClientConfig::load(),
    };
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if let Some(token) = cli.token {
        config.api_token = Some(token);
    }

    match cli.command {
        Commands::Show { conversation } => {
            let records = input::read_conversation(&conversation)?;
            let mut session = ChatSession::new(config, Arc::new(ScriptedChannelFactory::new()));
            session.load_conversation(&records);
            output::print_path(&session.visible_path());
        }
        Commands::Replay {
            conversation,
            events,
            chat,
            submit,
            regenerate,
            edit,
            text,
        } => {
            let request = TurnRequest::from_flags(submit, regenerate, edit, text)?;
            let records = input::read_conversation(&conversation)?;
            let factory = ScriptedChannelFactory::new();
            factory.push_script(input::read_events(&events)?);
            run_turn(config, Arc::new(factory), &chat, records, request).await?;
        }
        Commands::List => {
            let api = HttpConversationApi::new(config.api_base.clone(), config.api_token.clone());
            let chats = api
                .list_chats()
                .await
                .map_err(|error| anyhow!(error.user_message()))?;
            output::print_chats(&chats);
        }
        Commands::Live { chat, message } => {
            let api = HttpConversationApi::new(config.api_base.clone(), config.api_token.clone());
            let records = api
                .fetch_messages(&chat)
                .await
                .map_err(|error| anyhow!(error.user_message()))?;
            let channels = SseChannelFactory::new(config.api_base.clone(), config.api_token.clone());
            run_turn(
                config,
                Arc::new(channels),
                &chat,
                records,
                TurnRequest::Submit(message),
            )
            .await?;
        }
    }

    Ok(())
}

async fn run_turn(
    config: ClientConfig,
    channels: Arc<dyn ChannelFactory>,
    chat_id: &str,
    records: Vec<chat_core::MessageRecord>,
    request: TurnRequest,
) -> anyhow::Result<()> {
    let mut session = ChatSession::new(config, channels);
    let mut updates = session.subscribe();
    let (handle, task) = spawn_session(session);

    handle.load_conversation(chat_id, records).await?;
    request.send(&handle).await?;
    println!("{}", "assistant".green().bold());
    let state = output::follow_turn(&mut updates).await?;

    println!();
    output::print_path(&handle.visible_path().await?);
    drop(handle);
    task.await?;

    match state {
        TurnState::Completed => {
            println!("{}", "✓ turn completed".green());
            Ok(())
        }
        TurnState::Cancelled => {
            println!("{}", "turn cancelled".yellow());
            Ok(())
        }
        TurnState::Failed { error } => {
            eprintln!("{} {}", "✗".red(), error.red());
            bail!("turn failed: {error}")
        }
        other => bail!("turn stopped in state {other:?}"),
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
