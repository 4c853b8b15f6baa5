use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::{error, info};
use screenrec::configuration::ServerConfig;
use screenrec::error_handling::types::{StorageError, WebError};
use screenrec::web_interface::web_server::open_storage;
use screenrec::web_interface::WebServer;

#[derive(Parser)]
#[command(name = "screenrec-server")]
#[command(version)]
#[command(about = "Upload and library backend for screen recordings")]
struct Args {
    /// TOML file with the server settings. Replaces flags and environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    server: ServerConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations and exit
    Migrate,
    /// Run the HTTP API (default)
    Serve,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => ServerConfig::from_file(path).unwrap_or_else(|e| {
            error!("Unable to import configuration from {}: {}", path.display(), e);
            process::exit(1);
        }),
        None => args.server,
    };
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Migrate => migrate(&config).await,
        Command::Serve => serve(&config).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        if let WebError::StorageError(StorageError::PendingMigrations(_)) = e {
            error!("Run `screenrec-server migrate` before serving");
        }
        process::exit(1);
    }
}

async fn migrate(config: &ServerConfig) -> Result<(), WebError> {
    let storage = open_storage(config).await?;
    let applied = storage.migrate().await?;
    info!("Applied {} migration(s)", applied);
    Ok(())
}

async fn serve(config: &ServerConfig) -> Result<(), WebError> {
    let server = WebServer::from_config(config).await?;
    server.start().await
}
