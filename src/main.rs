use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::{info, warn};

use imgmod::classifier::content_safety::ContentSafetyClient;
use imgmod::config::Config;
use imgmod::db::models::Token;
use imgmod::db::Database;

/// imgmod: token-authenticated image moderation relay.
///
/// Forwards uploaded images to Azure AI Content Safety and returns a
/// safe/unsafe verdict with a confidence score.
#[derive(Parser)]
#[command(name = "imgmod", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run the HTTP API (mints an admin token first if none exists)
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "7000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Manage tokens directly against the database
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },

    /// Show token counts and recent usage
    Status,
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Mint a new token
    Create {
        /// Grant admin privileges
        #[arg(long)]
        admin: bool,
    },

    /// List all tokens
    List,

    /// Revoke a token by value
    Revoke {
        /// The token value to revoke
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("imgmod=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing imgmod database...");
            let db = init_database(&config).await?;
            let table_count = db.table_count().await?;
            println!("Database ready ({table_count} tables)");
            println!("\nNext: set CONTENT_SAFETY_ENDPOINT and CONTENT_SAFETY_KEY in .env,");
            println!("then run: imgmod serve");
        }

        Commands::Serve { port, bind } => {
            if let Err(e) = config.require_classifier() {
                warn!("{e}");
            }

            let db = init_database(&config).await?;

            // Must complete before the listener accepts traffic
            if let Some(token) = imgmod::tokens::bootstrap_admin_if_absent(db.as_ref()).await? {
                print_initial_admin_token(&token);
            }

            let classifier = Arc::new(ContentSafetyClient::new(
                &config.content_safety_endpoint,
                &config.content_safety_key,
                &config.content_safety_api_version,
            ));
            let state = imgmod::web::AppState::new(config, db, classifier);
            imgmod::web::run_server(state, port, &bind).await?;
        }

        Commands::Token { action } => {
            let db = open_database(&config).await?;
            match action {
                TokenCommand::Create { admin } => {
                    let token = imgmod::tokens::create_token(db.as_ref(), admin).await?;
                    let kind = if token.is_admin { "admin" } else { "regular" };
                    println!("Created {kind} token:");
                    println!("{}", token.token.bold());
                }
                TokenCommand::List => {
                    let tokens = imgmod::tokens::list_tokens(db.as_ref()).await?;
                    if tokens.is_empty() {
                        println!("No tokens.");
                    }
                    for token in &tokens {
                        let kind = if token.is_admin {
                            "admin".yellow()
                        } else {
                            "regular".normal()
                        };
                        println!(
                            "{}  {:<7}  {}",
                            token.token,
                            kind,
                            token.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                        );
                    }
                }
                TokenCommand::Revoke { value } => {
                    imgmod::tokens::delete_token(db.as_ref(), &value).await?;
                    println!("Token revoked.");
                }
            }
        }

        Commands::Status => {
            let db = open_database(&config).await?;
            imgmod::status::show(&db, &config).await?;
        }
    }

    Ok(())
}

/// The one place the bootstrap admin's value is shown.
fn print_initial_admin_token(token: &Token) {
    println!("\n{}", "=== Initial Admin Token ===".bold());
    println!("Token: {}", token.token.green());
    println!("{}\n", "===========================".bold());
    println!(
        "{}",
        "Store it now: it will not be shown again.".dimmed()
    );
}

/// Select the database backend based on configuration.
///
/// When DATABASE_URL is set and points to PostgreSQL, uses the Postgres backend
/// (requires the `postgres` feature). Otherwise, falls back to SQLite.
async fn open_database(config: &Config) -> Result<Arc<dyn Database>> {
    if let Some(ref url) = config.database_url {
        if imgmod::db::is_postgres_url(url) {
            return connect_postgres(url).await;
        }
    }
    open_sqlite(config)
}

/// Initialize the database (create if needed).
async fn init_database(config: &Config) -> Result<Arc<dyn Database>> {
    if let Some(ref url) = config.database_url {
        if imgmod::db::is_postgres_url(url) {
            return connect_postgres(url).await;
        }
    }
    initialize_sqlite(config)
}

#[cfg(feature = "postgres")]
async fn connect_postgres(url: &str) -> Result<Arc<dyn Database>> {
    info!("Using PostgreSQL backend");
    imgmod::db::connect_postgres(url).await
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_url: &str) -> Result<Arc<dyn Database>> {
    anyhow::bail!(
        "DATABASE_URL points to PostgreSQL but the 'postgres' feature is not compiled in.\n\
         Rebuild with: cargo build --features postgres"
    )
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &Config) -> Result<Arc<dyn Database>> {
    imgmod::db::open_sqlite(&config.db_path)
}

#[cfg(feature = "sqlite")]
fn initialize_sqlite(config: &Config) -> Result<Arc<dyn Database>> {
    imgmod::db::initialize_sqlite(&config.db_path)
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &Config) -> Result<Arc<dyn Database>> {
    anyhow::bail!("SQLite support is not compiled in; set DATABASE_URL to a PostgreSQL URL")
}

#[cfg(not(feature = "sqlite"))]
fn initialize_sqlite(config: &Config) -> Result<Arc<dyn Database>> {
    open_sqlite(config)
}
