//! SellerDesk CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! sdk-cli migrate
//!
//! # Check database connectivity and latency
//! sdk-cli db check
//!
//! # Provision users from a YAML file, 50 per transaction
//! sdk-cli seed users fixtures/users.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `db check` - Report connection health
//! - `seed users` - Upsert users in batches

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sdk-cli")]
#[command(author, version, about = "SellerDesk CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Database utilities
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Run a round-trip query and report latency
    Check,
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert users listed in a YAML file
    Users {
        /// Path to the YAML file
        file: String,

        /// Users per transaction
        #[arg(long, default_value_t = sellerdesk_server::db::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Role policy for existing users (`preserve_admin`, `force_seller`)
        #[arg(long, default_value = "preserve_admin")]
        policy: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Db { action } => match action {
            DbAction::Check => commands::db::check().await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Users {
                file,
                chunk_size,
                policy,
            } => {
                let summary = commands::seed::users(&file, chunk_size, &policy).await?;
                tracing::info!(
                    created = summary.created,
                    updated = summary.updated,
                    chunks = summary.chunks,
                    "Seeding complete"
                );
            }
        },
    }
    Ok(())
}
