mod chat_commands;
mod config_commands;
mod sessions_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "lexlinker", about = "LexLinker: WhatsApp legal assistant gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./lexlinker.toml and
    /// ~/.config/lexlinker/).
    #[arg(long, global = true, env = "LEXLINKER_CONFIG")]
    config: Option<PathBuf>,
    /// Directory holding conversation files (overrides config value).
    #[arg(long, global = true, env = "LEXLINKER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    // Gateway arguments (used when no subcommand is provided, or with `gateway` subcommand)
    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value and `PORT`).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway (default when no subcommand is provided).
    Gateway,
    /// Run one conversation turn locally and print the reply parts.
    Chat {
        /// Sender identity, e.g. `whatsapp:+5215512345678`.
        #[arg(long)]
        from: String,
        #[arg(short, long)]
        message: String,
    },
    /// Stored conversation management.
    Sessions {
        #[command(subcommand)]
        action: sessions_commands::SessionAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let mut config = match lexlinker_config::load_with_env(cli.config.as_deref()) {
        Ok(config) => config,
        // `config check` reports the problem itself.
        Err(e) if matches!(cli.command, Some(Commands::Config { .. })) => {
            tracing::debug!(error = %e, "config failed to load, checking defaults");
            let mut config = lexlinker_config::LexlinkerConfig::default();
            lexlinker_config::apply_env_overrides(&mut config);
            config
        },
        Err(e) => return Err(e),
    };
    if let Some(dir) = &cli.data_dir {
        config.server.data_dir = Some(dir.clone());
    }
    let data_dir = lexlinker_config::data_dir(&config);

    match cli.command {
        // Default: start gateway when no subcommand is provided
        None | Some(Commands::Gateway) => {
            info!(version = env!("CARGO_PKG_VERSION"), "lexlinker starting");
            // CLI args override config values
            if let Some(bind) = cli.bind {
                config.server.bind = bind;
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            let report = lexlinker_config::validate_config(&config);
            for d in &report.diagnostics {
                match d.severity {
                    lexlinker_config::Severity::Error => {
                        tracing::error!(path = %d.path, "{}", d.message);
                    },
                    lexlinker_config::Severity::Warning => {
                        tracing::warn!(path = %d.path, "{}", d.message);
                    },
                    lexlinker_config::Severity::Info => {},
                }
            }
            if report.has_errors() {
                anyhow::bail!("invalid configuration, run `lexlinker config check`");
            }
            lexlinker_gateway::start_gateway(config, &data_dir).await
        },
        Some(Commands::Chat { from, message }) => {
            chat_commands::run_chat(&config, &data_dir, &from, &message).await
        },
        Some(Commands::Sessions { action }) => {
            let store = lexlinker_gateway::services::build_store(&config, &data_dir);
            sessions_commands::handle_sessions(action, &store).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config.as_deref(), &config)
        },
    }
}
