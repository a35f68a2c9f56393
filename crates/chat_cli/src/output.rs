use std::io::{self, Write};

use chat_core::Role;
use chat_session::{SessionUpdate, VisibleNode};
use chat_state::TurnState;
use chat_stream::ChatSummary;
use colored::Colorize;
use tokio::sync::mpsc::UnboundedReceiver;

pub fn print_path(nodes: &[VisibleNode]) {
    if nodes.is_empty() {
        println!("{}", "(empty conversation)".dimmed());
        return;
    }
    for node in nodes {
        let tag = match node.role {
            Role::User => "user".cyan().bold(),
            Role::Assistant => "assistant".green().bold(),
        };
        let mut header = format!("{tag} {}", node.node_id.to_string().dimmed());
        if node.has_variants() {
            header.push_str(&format!(
                " {}",
                format!("‹ {}/{} ›", node.variant_position, node.variant_total).yellow()
            ));
        }
        if node.current {
            header.push_str(&format!(" {}", "(current)".magenta()));
        }
        println!("{header}");
        for line in node.markup.lines() {
            println!("  {line}");
        }
        println!();
    }
}

pub fn print_chats(chats: &[ChatSummary]) {
    if chats.is_empty() {
        println!("{}", "(no conversations)".dimmed());
        return;
    }
    for chat in chats {
        let title = if chat.title.is_empty() {
            "(untitled)".dimmed()
        } else {
            chat.title.as_str().normal()
        };
        println!("{} {title}", chat.id.cyan());
    }
}

/// Echo streamed text as it is revealed until the running turn finishes.
pub async fn follow_turn(
    updates: &mut UnboundedReceiver<SessionUpdate>,
) -> anyhow::Result<TurnState> {
    let mut shown = 0;
    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::TextFrame { text, .. } => {
                if text.len() > shown && text.is_char_boundary(shown) {
                    print!("{}", &text[shown..]);
                    io::stdout().flush()?;
                    shown = text.len();
                }
            }
            SessionUpdate::PathChanged { diff, .. } => {
                tracing::debug!(
                    kept = diff.common_prefix,
                    removed = ?diff.removed,
                    added = ?diff.added,
                    "path changed"
                );
            }
            SessionUpdate::TurnFinished { state, .. } => {
                println!();
                return Ok(state);
            }
        }
    }
    anyhow::bail!("session stopped before the turn finished")
}
