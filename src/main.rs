//! taskhub
//!
//! Task management API with an assignment workflow, scheduled maintenance
//! jobs and a browser front end.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use taskhub::cli::commands;
use taskhub::cli::{Cli, Command, ServeArgs};
use taskhub::config::Config;
use taskhub::logging::{self, LogTarget};
use tracing::debug;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let (mut config, config_path) = Config::discover(cli.config.as_deref())?;
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.clone();
    }
    config.validate()?;
    debug!(?config_path, "Configuration loaded");

    match cli.command {
        Some(Command::Serve(args)) => commands::run_serve(config, args, config_path).await?,
        None => commands::run_serve(config, ServeArgs::default(), config_path).await?,
        Some(Command::Web(args)) => commands::run_web(config, args).await?,
        Some(Command::SweepOverdue) => print_json(&commands::run_sweep_overdue(&config)?)?,
        Some(Command::CleanupArchived(args)) => {
            print_json(&commands::run_cleanup_archived(&config, &args)?)?
        }
        Some(Command::CreateUser(args)) => {
            let user = commands::run_create_user(&config, &args)?;
            print_json(&serde_json::json!({
                "id": user.id,
                "username": user.username,
                "is_staff": user.is_staff,
                "is_superuser": user.is_superuser,
            }))?
        }
        Some(Command::DeactivateUser(args)) => commands::run_deactivate_user(&config, &args)?,
        Some(Command::FlushExpiredTokens) => {
            let removed = commands::run_flush_expired_tokens(&config)?;
            print_json(&serde_json::json!({ "removed": removed }))?
        }
    }

    Ok(())
}
