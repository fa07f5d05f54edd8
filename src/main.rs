//! Vantage - Multi-Party Evaluation Platform
//!
//! Main entry point: the `serve` subcommand runs the HTTP API; `init`,
//! `seed`, and `status` are one-shot database operations.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{self, EnvFilter};
use vantage_core::{
    error::Result, seed, ApiServer, ApiServerConfig, AppConfig, LibsqlStore, SessionSigner, Store,
    VantageError,
};

#[derive(Parser)]
#[command(name = "vantage")]
#[command(about = "Multi-party evaluation platform", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Database path (overrides VANTAGE_DATABASE_URL)
    #[arg(long)]
    db_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address (overrides VANTAGE_BIND_ADDR)
        #[arg(long)]
        addr: Option<String>,
    },

    /// Initialize the database and seed the demo roster
    Init,

    /// Seed the demo roster (no-op when users already exist)
    Seed,

    /// Check database health and report entity counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Use the requested level for vantage, WARN for noisy external crates
    let filter = EnvFilter::new(format!(
        "vantage={},tower_http=warn,hyper=warn",
        level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load()?;
    if let Some(db_path) = cli.db_path {
        config.database_url = db_path;
    }

    match cli.command {
        Some(Commands::Serve { addr }) => {
            if let Some(addr) = addr {
                config.bind_addr = addr;
            }
            serve(config).await
        }
        None => serve(config).await,
        Some(Commands::Init) => init(config).await,
        Some(Commands::Seed) => seed_cmd(config).await,
        Some(Commands::Status) => status(config).await,
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<LibsqlStore>> {
    let mode = LibsqlStore::mode_from_url(&config.database_url);
    Ok(Arc::new(LibsqlStore::connect(mode, true).await?))
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Vantage v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config).await?;
    let seeded = seed::seed_users(store.as_ref()).await?;
    if seeded > 0 {
        info!("Seeded {} demo users into empty database", seeded);
    }

    let addr = config
        .bind_addr
        .parse()
        .map_err(|e| VantageError::Config(config::ConfigError::Message(format!(
            "Invalid bind address '{}': {}",
            config.bind_addr, e
        ))))?;

    let sessions = SessionSigner::new(
        config.session_secret.as_bytes().to_vec(),
        config.session_ttl_hours,
    );
    let server = ApiServer::new(ApiServerConfig { addr }, store, sessions);
    server.serve().await.map_err(VantageError::from)
}

async fn init(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    let seeded = seed::seed_users(store.as_ref()).await?;
    println!("Database initialized at {}", config.database_url);
    println!("Seeded {} users", seeded);
    Ok(())
}

async fn seed_cmd(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    let seeded = seed::seed_users(store.as_ref()).await?;
    if seeded > 0 {
        println!("Seeded {} users", seeded);
    } else {
        println!("Users already present, nothing to do");
    }
    Ok(())
}

async fn status(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    match store.health_check().await {
        Ok(()) => println!("Database: healthy ({})", config.database_url),
        Err(e) => {
            println!("Database: UNHEALTHY ({})", e);
            return Err(e);
        }
    }
    let counts = store.entity_counts().await?;
    println!("  forms:               {}", counts.forms);
    println!("  users:               {}", counts.users);
    println!("  responses:           {}", counts.responses);
    println!("  pending assignments: {}", counts.pending_assignments);
    Ok(())
}
