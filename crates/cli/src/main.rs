//! Blue Lender CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bl-cli migrate
//!
//! # Create an admin account (password from ADMIN_PASSWORD or --password)
//! bl-cli admin create -u reviewer -e reviewer@bluelender.com --view-applications
//!
//! # List admin accounts
//! bl-cli admin list
//!
//! # Remove non-owner accounts holding every permission
//! bl-cli admin cleanup
//!
//! # Re-send queued failed emails once
//! bl-cli emails retry --limit 100
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bl-cli")]
#[command(author, version, about = "Blue Lender intake CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Work with the failed-email queue
    Emails {
        #[command(subcommand)]
        action: EmailsAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an admin account
    Create(CreateAdminArgs),
    /// List admin accounts
    List,
    /// Delete non-owner accounts that hold every permission
    Cleanup,
}

#[derive(Args)]
struct CreateAdminArgs {
    /// Display name
    #[arg(short, long)]
    username: String,

    /// Login email address
    #[arg(short, long)]
    email: String,

    /// Login password (at least 8 characters)
    #[arg(short, long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    /// Role (`admin` or `sub-admin`)
    #[arg(short, long, default_value = "sub-admin")]
    role: String,

    #[arg(long)]
    view_applications: bool,

    #[arg(long)]
    manage_admins: bool,

    #[arg(long)]
    manage_smtp: bool,

    #[arg(long)]
    manage_recipients: bool,
}

#[derive(Subcommand)]
enum EmailsAction {
    /// Re-send queued emails once
    Retry {
        /// Maximum number of queued emails to attempt
        #[arg(short, long, default_value_t = 100)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Admin { action } => match action {
            AdminAction::Create(args) => {
                let permissions = bluelender_core::Permissions {
                    view_applications: args.view_applications,
                    manage_admins: args.manage_admins,
                    manage_smtp: args.manage_smtp,
                    manage_recipients: args.manage_recipients,
                };
                commands::admin::create(
                    &args.username,
                    &args.email,
                    &args.password,
                    &args.role,
                    permissions,
                )
                .await?;
            }
            AdminAction::List => commands::admin::list().await?,
            AdminAction::Cleanup => commands::admin::cleanup().await?,
        },
        Commands::Emails { action } => match action {
            EmailsAction::Retry { limit } => commands::emails::retry(limit).await?,
        },
    }
    Ok(())
}
