use std::path::Path;

use {
    anyhow::Result,
    lexlinker_channels::split,
    lexlinker_config::LexlinkerConfig,
    lexlinker_gateway::services::{build_executor, build_orchestrator, build_store},
};

/// Run one turn for `from` and print the reply as it would be delivered.
pub async fn run_chat(
    config: &LexlinkerConfig,
    data_dir: &Path,
    from: &str,
    message: &str,
) -> Result<()> {
    let store = build_store(config, data_dir);
    let orchestrator = build_orchestrator(config, store, build_executor(config))?;

    let turn = orchestrator
        .run_detached(from.to_string(), message.to_string())
        .await?;
    tracing::debug!(kind = ?turn.kind, "turn finished");

    let parts = split(&turn.reply, config.outbound.chunk_limit)?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{part}");
    }
    Ok(())
}
