use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use rounds_cli::{commands, CliStatus};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about = "Waste-collection rounds client")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Base URL of the remote document store.
    #[arg(long, global = true, env = "ROUNDS_REMOTE")]
    remote: Option<String>,
    /// Acting collector id (stands in for the login session).
    #[arg(long, global = true, env = "ROUNDS_COLLECTOR")]
    collector: Option<String>,
    /// Cache database directory; defaults to the per-user data dir.
    #[arg(long, global = true)]
    cache_root: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch schedules for a date (defaults to today)
    Fetch {
        #[arg(long)]
        date: Option<String>,
    },
    /// Mark a stop completed, missed or on hold
    Mark {
        schedule_id: String,
        #[arg(value_enum)]
        status: CliStatus,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// List queued status updates
    Pending,
    /// Push queued status updates to the remote store
    Replay,
    /// Show cache and connectivity status
    Status,
    /// Show one schedule document from the remote store
    Show { schedule_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("default subscriber");

    let cache_root = match cli.cache_root {
        Some(root) => root,
        None => rounds_persistence::default_cache_root()?,
    };

    fn required(value: Option<String>, flag: &str, env: &str) -> anyhow::Result<String> {
        value.ok_or_else(|| anyhow::anyhow!("missing {flag} (or set {env})"))
    }
    let remote = || required(cli.remote.clone(), "--remote", "ROUNDS_REMOTE");
    let collector = || required(cli.collector.clone(), "--collector", "ROUNDS_COLLECTOR");

    match cli.command {
        Commands::Fetch { date } => {
            commands::cmd_fetch(remote()?, cache_root, collector()?, date).await?;
        }
        Commands::Mark {
            schedule_id,
            status,
            reason,
        } => {
            commands::cmd_mark(
                remote()?,
                cache_root,
                collector()?,
                schedule_id,
                status,
                reason,
            )
            .await?;
        }
        Commands::Pending => commands::cmd_pending(cache_root)?,
        Commands::Replay => commands::cmd_replay(remote()?, cache_root, collector()?).await?,
        Commands::Status => commands::cmd_status(remote()?, cache_root, collector()?).await?,
        Commands::Show { schedule_id } => commands::cmd_show(remote()?, schedule_id).await?,
    }

    Ok(())
}
