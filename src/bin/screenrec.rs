use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::{error, info};
use screenrec::client::{ApiClient, LibraryView};
use screenrec::configuration::ClientConfig;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "screenrec")]
#[command(version)]
#[command(about = "Command line client for the screen recording backend")]
struct Args {
    #[command(flatten)]
    client: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload an existing recording file
    Upload {
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
    /// Print the library as a table
    List,
    /// Render the library as an HTML page with inline players
    Library {
        /// Write the page to this file instead of stdout
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Print the URL a recording is served from
    Open { id: Uuid },
    /// Check that the backend answers
    Health,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let args = Args::parse();
    if let Err(e) = args.client.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }
    let client = ApiClient::new(&args.client).unwrap_or_else(|e| {
        error!("Unable to build the HTTP client: {}", e);
        process::exit(1);
    });

    if let Err(e) = run(&client, args.command).await {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run(client: &ApiClient, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Upload { path, title } => {
            let bytes = tokio::fs::read(&path).await?;
            let title = title.or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            });
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("webm");
            let recording = client
                .upload_bytes(bytes, title.as_deref(), extension)
                .await?;
            info!("Uploaded {} ({} bytes)", recording.display_title(), recording.size);
            println!("{}", recording.url);
        }
        Command::List => {
            print!("{}", LibraryView::load(client).await.render_text());
        }
        Command::Library { html } => {
            let page = LibraryView::load(client).await.render_html();
            match html {
                Some(path) => {
                    tokio::fs::write(&path, page).await?;
                    info!("Library written to {}", path.display());
                }
                None => print!("{}", page),
            }
        }
        Command::Open { id } => match client.fetch_url(id).await? {
            Some(url) => println!("{}", url),
            None => return Err(format!("recording {} not found", id).into()),
        },
        Command::Health => {
            if !client.health().await? {
                return Err("backend reported unhealthy".into());
            }
            println!("ok");
        }
    }
    Ok(())
}
