use clap::{Args, Parser, Subcommand};
use jforward::config::types::duration_format::parse_duration;
use jforward::config::{resolve_config_path, Overrides};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jforward")]
#[command(version, about = "Forwards the systemd journal to an HTTP log receiver", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct OverrideArgs {
    /// Receiver URL (skips provisioning)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Source category sent with every batch
    #[arg(long, global = true)]
    category: Option<String>,

    /// Only forward journal records matching this pattern
    #[arg(long, global = true)]
    grep: Option<String>,

    /// How often the journal is read, e.g. 5s
    #[arg(long, global = true, value_parser = parse_duration)]
    read_interval: Option<Duration>,

    /// How often a batch is uploaded, e.g. 2s
    #[arg(long, global = true, value_parser = parse_duration)]
    upload_interval: Option<Duration>,

    /// Directory holding the cursor and pending batches
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,
}

impl From<OverrideArgs> for Overrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            url: args.url,
            category: args.category,
            grep: args.grep,
            read_interval: args.read_interval,
            upload_interval: args.upload_interval,
            work_dir: args.work_dir,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest and deliver until interrupted (default)
    Run,
    /// Upload every pending batch once and exit
    Flush,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "jforward=debug" } else { "jforward=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = resolve_config_path(cli.config.as_deref());
    let overrides = Overrides::from(cli.overrides);

    match cli.command {
        Some(Commands::Run) | None => {
            jforward::cli::run::run(config_path, overrides).await?;
        }
        Some(Commands::Flush) => {
            jforward::cli::flush::flush(config_path, overrides).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                jforward::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
