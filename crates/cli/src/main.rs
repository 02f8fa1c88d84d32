//! Best Wishes CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bw-cli migrate
//!
//! # Create a staff account
//! bw-cli user create -e admin@example.com -f Ada -l Admin -r admin
//!
//! # Seed the quote library and occasion calendar
//! bw-cli seed quotes crates/cli/seeds/quotes.yaml
//! bw-cli seed events crates/cli/seeds/events.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create staff accounts
//! - `seed` - Load quotes or events from YAML

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bw-cli")]
#[command(author, version, about = "Best Wishes CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Load seed data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new staff account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Role (`admin`, `inventoryManager`, `deliveryStaff`)
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// Password (8+ characters with a number and a symbol)
        #[arg(short, long, env = "BW_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Seed customization quotes
    Quotes {
        /// Path to the YAML file
        file: String,
    },
    /// Seed occasion calendar events
    Events {
        /// Path to the YAML file
        file: String,
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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                first_name,
                last_name,
                role,
                password,
            } => {
                commands::users::create(&email, &first_name, &last_name, &role, &password).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Quotes { file } => commands::seed::quotes(&file).await?,
            SeedTarget::Events { file } => commands::seed::events(&file).await?,
        },
    }
    Ok(())
}
