use std::fs;
use std::sync::Arc;

use anyhow::bail;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clap::{Parser, Subcommand};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use darkroom::access::SharingLedger;
use darkroom::auth::{SessionEngine, SystemClock};
use darkroom::config::ServerConfig;
use darkroom::server::{AppState, create_router};
use darkroom::storage::PhotoStorage;
use darkroom::store::{SqliteStore, Store};

const SECRET_BYTES: usize = 48;

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "darkroom")]
#[command(about = "A photo sharing server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the server (create database and signing secret)
    Init {
        /// Data directory for database and photo storage
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and photo storage
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Access token lifetime in minutes
        #[arg(long, default_value = "15")]
        access_ttl_minutes: i64,

        /// Refresh token lifetime in days
        #[arg(long, default_value = "7")]
        refresh_ttl_days: i64,
    },
}

fn run_init(data_dir: String) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("darkroom.db");
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let secret_path = data_path.join(".jwt_secret");
    if secret_path.exists() {
        bail!(
            "Server already initialized. Signing secret exists at: {}",
            secret_path.display()
        );
    }

    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    fs::write(&secret_path, URL_SAFE_NO_PAD.encode(bytes))?;

    #[cfg(unix)]
    set_restrictive_permissions(&secret_path);

    println!("Initialized data directory at {}", data_path.display());
    println!("Signing secret written to {}", secret_path.display());

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("darkroom=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => {
            run_init(data_dir)?;
        }
        Commands::Serve {
            host,
            port,
            data_dir,
            access_ttl_minutes,
            refresh_ttl_days,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                auth: darkroom::config::AuthConfig {
                    access_ttl_minutes,
                    refresh_ttl_days,
                },
            };

            let secret_path = config.secret_path();
            if !secret_path.exists() {
                bail!(
                    "Server not initialized. Run 'darkroom init' first to create the database and signing secret."
                );
            }
            let secret = fs::read_to_string(&secret_path)?.trim().to_string();
            if secret.is_empty() {
                bail!("Signing secret at {} is empty", secret_path.display());
            }

            let store: Arc<dyn Store> = Arc::new(SqliteStore::new(config.db_path())?);
            store.initialize()?;

            let state = Arc::new(AppState {
                store: store.clone(),
                sessions: SessionEngine::new(
                    store.clone(),
                    secret.as_bytes(),
                    Arc::new(SystemClock),
                    config.auth.access_ttl_minutes,
                    config.auth.refresh_ttl_days,
                ),
                ledger: SharingLedger::new(store.clone()),
                photos: PhotoStorage::new(&config.data_dir),
            });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;

            store.close()?;
        }
    }

    Ok(())
}
