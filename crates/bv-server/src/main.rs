use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use bv_server::bootstrap::{self, RuntimeConfig};
use bv_server::config::AppConfig;
use bv_server::handler::{self, AppState};
use bv_store::{SqliteVoteStore, VoteStore};

#[derive(Parser)]
#[command(name = "bv", about = "blindvote — blind model-comparison voting server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Validate configuration file and exit.
    Validate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config: {e}");
            std::process::exit(1);
        }
    };

    let runtime = match bootstrap::into_runtime(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Config invalid: {e:#}");
            std::process::exit(1);
        }
    };

    if let Some(Command::Validate) = cli.command {
        println!("Config valid: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&runtime);
    serve(runtime)
}

fn init_tracing(runtime: &RuntimeConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(runtime.log_level.clone()));

    if runtime.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn serve(runtime: RuntimeConfig) -> anyhow::Result<()> {
    let store = SqliteVoteStore::new(&runtime.database_path)?;
    store.init()?;

    let state = Arc::new(AppState {
        store: Arc::new(store),
        roster: runtime.roster,
        session_vote_cap: runtime.session_vote_cap,
    });

    let app = handler::router(state);

    let listener = tokio::net::TcpListener::bind(&runtime.listen_addr).await?;
    tracing::info!(
        listen = %runtime.listen_addr,
        database = %runtime.database_path.display(),
        "blindvote server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
