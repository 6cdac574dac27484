mod app;
mod error;
mod shutdown;

use crate::app::App;
use crate::error::{ErrorKind, Result};
use clap::{Args, Parser, Subcommand};
use exn::ResultExt;
use lectern_store::{NewTracker, Status};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "lectern", version, about = "Track serialized titles and get told about new chapters")]
struct Cli {
    /// Configuration file, merged over the platform configuration directory.
    #[arg(short, long, global = true, env = "LECTERN_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll on a schedule until interrupted.
    Run,
    /// Run a single synchronization cycle and exit.
    Poll,
    /// Start tracking a title.
    Add(AddArgs),
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    title: String,
    /// Key of the connector serving the title.
    #[arg(long)]
    source: String,
    /// Canonical URL of the title on its source.
    #[arg(long)]
    url: String,
    #[arg(long, default_value = "reading")]
    status: String,
    /// The source's own identifier for the title.
    #[arg(long)]
    item_id: Option<String>,
    /// Last chapter already read.
    #[arg(long)]
    chapter: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = lectern_config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Run => run(&config).await,
        Command::Poll => poll(&config).await,
        Command::Add(args) => add(&config, args).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: &lectern_config::Config) -> Result<()> {
    let app = App::build(config).await?;
    let shutdown = CancellationToken::new();

    app.poller.start(&shutdown);
    shutdown::wait_for_signal(shutdown.clone()).await;

    if !app.poller.stop_wait(STOP_TIMEOUT).await {
        tracing::warn!("Abandoning the running poll cycle");
    }
    app.resolver.shutdown().await;
    app.db.close().await;
    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn poll(config: &lectern_config::Config) -> Result<()> {
    let app = App::build(config).await?;
    let report = app.poller.run_once().await;
    println!(
        "listed {} / checked {} / skipped {} / advanced {} / notified {}",
        report.listed, report.checked, report.skipped, report.advanced, report.notified
    );
    app.db.close().await;
    Ok(())
}

async fn add(config: &lectern_config::Config, args: AddArgs) -> Result<()> {
    let status: Status = args
        .status
        .parse::<Status>()
        .or_raise(|| ErrorKind::InvalidArgument(format!("unknown status {:?}", args.status)))?;
    let mut tracker = NewTracker::new(args.title, args.source, args.url).with_status(status);
    if let Some(item_id) = args.item_id {
        tracker = tracker.with_item_id(item_id);
    }
    if let Some(chapter) = args.chapter {
        tracker = tracker.with_chapter(chapter);
    }

    let db = app::open_database(config).await?;
    let id = lectern_store::Repository::from(&db).insert(&tracker).await.or_raise(|| ErrorKind::Database)?;
    db.close().await;
    println!("{id}");
    Ok(())
}
