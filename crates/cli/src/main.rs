//! BRNNO CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! brnno-cli migrate
//!
//! # Grant or revoke admin access
//! brnno-cli admin promote <uid>
//! brnno-cli admin demote <uid>
//!
//! # Review provider applications
//! brnno-cli providers list --status pending
//! brnno-cli providers approve <application-id>
//! brnno-cli providers reject <application-id>
//!
//! # Waitlist report as JSON
//! brnno-cli analytics waitlist
//! ```
//!
//! # Environment Variables
//!
//! - `BRNNO_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `providers approve` also reads the server configuration, so payout
//!   accounts and geocoding use the same credentials as the API

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use brnno_core::ApplicationStatus;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "brnno-cli")]
#[command(author, version, about = "BRNNO operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin access
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Review provider applications
    Providers {
        #[command(subcommand)]
        action: ProviderAction,
    },
    /// Print reports
    Analytics {
        #[command(subcommand)]
        report: Report,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give a user the admin role
    Promote {
        /// User ID (identity provider uid)
        uid: String,
    },
    /// Return a user to the regular role
    Demote {
        /// User ID (identity provider uid)
        uid: String,
    },
}

#[derive(Subcommand)]
enum ProviderAction {
    /// List applications
    List {
        /// Review state (`pending`, `approved`, `rejected`)
        #[arg(short, long, default_value = "pending")]
        status: ApplicationStatus,
    },
    /// Approve an application
    Approve {
        /// Application ID
        id: String,
    },
    /// Reject an application
    Reject {
        /// Application ID
        id: String,
    },
}

#[derive(Subcommand)]
enum Report {
    /// Waitlist counts by city, service, urgency and vehicle
    Waitlist,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Promote { uid } => commands::admin::promote(&uid).await?,
            AdminAction::Demote { uid } => commands::admin::demote(&uid).await?,
        },
        Commands::Providers { action } => match action {
            ProviderAction::List { status } => commands::providers::list(status).await?,
            ProviderAction::Approve { id } => commands::providers::approve(&id).await?,
            ProviderAction::Reject { id } => commands::providers::reject(&id).await?,
        },
        Commands::Analytics { report } => match report {
            Report::Waitlist => commands::analytics::waitlist().await?,
        },
    }
    Ok(())
}
