mod chat_commands;
mod config_commands;
mod models_commands;
mod runtime;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand, ValueEnum},
    sapfire_config::SapfireConfig,
    sapfire_sessions::ContactKind,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "sapfire", about = "Sapfire: AI conversations from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of the discovered one.
    #[arg(long, global = true, env = "SAPFIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Custom data directory (overrides `storage.data_dir`).
    #[arg(long, global = true, env = "SAPFIRE_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message to a contact and print the reply.
    Send {
        /// Contact id (see `sapfire contacts`).
        #[arg(long)]
        to: String,
        /// Message text; prefix with `/image` to generate an image.
        #[arg(short, long)]
        message: String,
    },
    /// Interactive conversation with a contact.
    Chat {
        /// Contact id.
        contact: String,
    },
    /// Print a conversation log.
    History {
        contact: String,
        /// Only the last N messages.
        #[arg(short = 'n', long)]
        last: Option<usize>,
        /// One JSON object per line.
        #[arg(long)]
        json: bool,
    },
    /// Toggle a reaction on a message.
    React {
        contact: String,
        message_id: String,
        emoji: String,
    },
    /// List contacts, groups and channels.
    Contacts,
    /// Create a group or channel you own.
    Create {
        kind: CommunityKind,
        /// Display name.
        name: String,
        /// Bio shown for the community.
        #[arg(short, long, default_value = "")]
        description: String,
        /// Direct contact to add to a group (repeatable).
        #[arg(short, long = "member")]
        members: Vec<String>,
    },
    /// List models available to the configured key.
    Models,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CommunityKind {
    Group,
    Channel,
}

impl From<CommunityKind> for ContactKind {
    fn from(kind: CommunityKind) -> Self {
        match kind {
            CommunityKind::Group => Self::Group,
            CommunityKind::Channel => Self::Channel,
        }
    }
}

/// Effective configuration and the file it is read from and edited in.
pub struct LoadedConfig {
    pub config: SapfireConfig,
    pub path: PathBuf,
}

/// Initialise tracing with an env-filter and either JSON or compact output.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Config from `--config` or discovery, with `--data-dir` applied.
fn load_config(cli: &Cli) -> anyhow::Result<LoadedConfig> {
    let mut config = match cli.config {
        Some(ref path) => sapfire_config::load_config(path)?,
        None => sapfire_config::discover_and_load(),
    };
    if let Some(ref dir) = cli.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }
    let path = cli
        .config
        .clone()
        .unwrap_or_else(sapfire_config::find_or_default_config_path);
    debug!(
        config = %path.display(),
        data_dir = %sapfire_config::data_dir(&config).display(),
        "config loaded"
    );
    Ok(LoadedConfig { config, path })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "sapfire starting");

    match cli.command {
        Commands::Config { ref action } => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
        Commands::Send {
            ref to,
            ref message,
        } => chat_commands::send(&load_config(&cli)?, to, message).await,
        Commands::Chat { ref contact } => {
            chat_commands::interactive(&load_config(&cli)?, contact).await
        },
        Commands::History {
            ref contact,
            last,
            json,
        } => chat_commands::history(&load_config(&cli)?, contact, last, json).await,
        Commands::React {
            ref contact,
            ref message_id,
            ref emoji,
        } => chat_commands::react(&load_config(&cli)?, contact, message_id, emoji).await,
        Commands::Contacts => chat_commands::contacts(&load_config(&cli)?).await,
        Commands::Create {
            kind,
            ref name,
            ref description,
            ref members,
        } => {
            let loaded = load_config(&cli)?;
            chat_commands::create(&loaded, kind.into(), name, description, members).await
        },
        Commands::Models => models_commands::list(&load_config(&cli)?.config).await,
    }
}
