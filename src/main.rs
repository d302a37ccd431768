use std::path::{Path, PathBuf};
#[cfg(feature = "http-api")]
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use pipegram_core::config::{self, Config};
use pipegram_core::service::auth::generate_admin_token;
use pipegram_core::session::{FileSessionStore, SessionRecord, SessionStore};

#[derive(Parser)]
#[command(
    name = "pipegram",
    about = "pipegram - session-backed social media automation API",
    version = pipegram_core::VERSION,
)]
struct Cli {
    /// Config file (default: ~/.pipegram/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    #[cfg(feature = "http-api")]
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Print a freshly generated admin token
    Token,
    /// Show pipegram status
    Status,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List stored usernames
    List,
    /// Print a stored session as JSON
    Show { username: String },
    /// Import a session blob from a JSON file
    Import { username: String, file: PathBuf },
    /// Delete a stored session
    Delete { username: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pipegram=info".parse::<tracing_subscriber::filter::Directive>()?),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config_from_env(cli.config.as_deref());

    match cli.command {
        #[cfg(feature = "http-api")]
        Commands::Serve { host, port } => cmd_serve(cfg, host, port).await?,
        Commands::Sessions { command } => {
            let store = open_store(&cfg)?;
            match command {
                SessionCommands::List => cmd_sessions_list(&store)?,
                SessionCommands::Show { username } => cmd_sessions_show(&store, &username)?,
                SessionCommands::Import { username, file } => {
                    cmd_sessions_import(&store, &username, &file)?
                }
                SessionCommands::Delete { username } => cmd_sessions_delete(&store, &username)?,
            }
        }
        Commands::Token => println!("{}", generate_admin_token()),
        Commands::Status => cmd_status(&cfg, cli.config.as_deref())?,
    }

    Ok(())
}

// ====== Commands ======

fn open_store(cfg: &Config) -> Result<FileSessionStore> {
    let dir = cfg.sessions_path();
    FileSessionStore::new(&dir)
        .with_context(|| format!("Failed to open sessions directory {}", dir.display()))
}

#[cfg(feature = "http-api")]
async fn cmd_serve(mut cfg: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    use pipegram_core::remote::BridgePlatform;
    use pipegram_core::service::{self, AppState};

    if let Some(host) = host {
        cfg.server.host = host;
    }
    if let Some(port) = port {
        cfg.server.port = port;
    }
    cfg.validate()?;

    let store = Arc::new(open_store(&cfg)?);
    let platform = Arc::new(BridgePlatform::new(&cfg.bridge).context("Failed to build bridge client")?);
    let addr = cfg.bind_addr();

    tracing::info!(
        "Sessions in {}, bridge at {}",
        store.sessions_dir().display(),
        platform.base_url()
    );

    let state = Arc::new(AppState::new(cfg, store, platform)?);
    service::serve(&addr, state).await
}

fn cmd_sessions_list(store: &FileSessionStore) -> Result<()> {
    let usernames = store.list()?;
    if usernames.is_empty() {
        println!("No sessions stored.");
        return Ok(());
    }
    for username in usernames {
        println!("{}", username);
    }
    Ok(())
}

fn cmd_sessions_show(store: &FileSessionStore, username: &str) -> Result<()> {
    match store.load(username)? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => bail!("No session found for '{}'", username),
    }
}

fn cmd_sessions_import(store: &FileSessionStore, username: &str, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let blob: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    let Some(record) = SessionRecord::from_import(username, blob) else {
        bail!("{} must contain a JSON object", file.display());
    };

    store.save(&record)?;
    println!("✓ Imported session for {}", username);
    Ok(())
}

fn cmd_sessions_delete(store: &FileSessionStore, username: &str) -> Result<()> {
    if !store.delete(username)? {
        bail!("No session found for '{}'", username);
    }
    println!("✓ Deleted session for {}", username);
    Ok(())
}

fn cmd_status(cfg: &Config, config_path: Option<&Path>) -> Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::get_config_path);
    let sessions_dir = cfg.sessions_path();

    println!("pipegram Status\n");
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() { "✓" } else { "✗" }
    );
    println!(
        "Sessions: {} {}",
        sessions_dir.display(),
        if sessions_dir.exists() { "✓" } else { "✗" }
    );
    println!("Listen: {}", cfg.bind_addr());
    println!("Bridge: {}", cfg.bridge.url);
    println!(
        "Admin token: {}",
        if cfg.auth.admin_token.trim().is_empty() {
            "not set"
        } else {
            "✓"
        }
    );

    if sessions_dir.exists() {
        let store = open_store(cfg)?;
        println!("Stored sessions: {}", store.list()?.len());
    }

    Ok(())
}
