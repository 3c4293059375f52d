use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod api;
mod commands;
mod config;
mod db;
mod error;
mod models;
mod services;
mod utils;

use api::nordigen::NordigenClient;
use commands::{Cli, Commands, LsCommands, SyncCommands};
use error::Error;
use services::email_service::Mailer;
use services::{link_service, sync_service};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        cli.log_level.to_lowercase()
    };
    let directive = match format!("open_banking_archiver={level}").parse() {
        Ok(directive) => directive,
        Err(_) => {
            eprintln!("Error: invalid log level `{}`", cli.log_level);
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_target(false)
        .init();

    if let Err(err) = run(cli.command).await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), Error> {
    let config = config::resolve_config()?;
    let pool = db::init_db(&config).await?;
    let mut client = NordigenClient::new(
        config.nordigen_secret_id.clone(),
        config.nordigen_secret_key.clone(),
    );

    match command {
        Commands::Ls { command } => match command {
            LsCommands::Banks => commands::list::banks(&pool).await,
            LsCommands::Accounts => commands::list::accounts(&pool).await,
        },
        Commands::Sync { command } => match command {
            SyncCommands::Banks => sync_service::sync_banks(&mut client, &pool).await,
            SyncCommands::Accounts => sync_service::sync_accounts(&mut client, &pool).await,
            SyncCommands::Transactions { poll_interval } => {
                let mailer = Mailer::new(&config)?;
                sync_service::sync_transactions(
                    &mut client,
                    &pool,
                    &mailer,
                    &config.user_email,
                    poll_interval,
                )
                .await
            }
        },
        Commands::Link { bank_name } => link_service::link(&mut client, &pool, &bank_name).await,
        Commands::Unlink { bank_name } => {
            link_service::unlink(&mut client, &pool, &bank_name).await
        }
        Commands::Status { bank_name } => {
            link_service::status(&mut client, &pool, &bank_name).await
        }
        Commands::Prune => link_service::prune(&mut client, &pool).await,
    }
}
