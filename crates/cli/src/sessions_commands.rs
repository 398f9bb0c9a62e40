use {
    anyhow::{Context, Result},
    clap::Subcommand,
    lexlinker_sessions::{ConversationIdentity, HistoryStore, JsonlHistoryStore},
};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List stored conversations.
    List,
    /// Print the stored messages of one conversation.
    History {
        identity: String,
        /// Print the full record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete one conversation.
    Clear { identity: String },
}

fn parse_identity(raw: &str) -> Result<ConversationIdentity> {
    ConversationIdentity::parse(raw).with_context(|| format!("invalid identity {raw:?}"))
}

pub async fn handle_sessions(action: SessionAction, store: &JsonlHistoryStore) -> Result<()> {
    match action {
        SessionAction::List => {
            let identities = store.list_identities().await?;
            if identities.is_empty() {
                println!("No conversations found.");
            }
            for identity in identities {
                let record = store.record(&identity).await?;
                match record {
                    Some(r) => println!(
                        "  {}  messages={}  variant={}  updated_at={}",
                        identity,
                        r.conversation_history.len(),
                        r.current_agent_variant.as_deref().unwrap_or("-"),
                        r.updated_at
                    ),
                    None => println!("  {identity}"),
                }
            }
        },
        SessionAction::History { identity, json } => {
            let identity = parse_identity(&identity)?;
            let Some(record) = store.record(&identity).await? else {
                println!("No conversation for {identity}.");
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                for m in &record.conversation_history {
                    println!("[{}] {}: {}", m.timestamp, m.role, m.content);
                }
            }
        },
        SessionAction::Clear { identity } => {
            let identity = parse_identity(&identity)?;
            store.clear(&identity).await?;
            println!("Conversation cleared for {identity}.");
        },
    }
    Ok(())
}
