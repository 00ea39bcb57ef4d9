//! CLI command definitions for taskhub.
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Task management API server, browser front end and maintenance tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the API server and the maintenance scheduler (default)
    Serve(ServeArgs),

    /// Start the browser front end
    Web(WebArgs),

    /// Mark past-due tasks as overdue once and print the report
    SweepOverdue,

    /// Purge archived tasks older than the retention window and print the report
    CleanupArchived(CleanupArgs),

    /// Create an account
    CreateUser(CreateUserArgs),

    /// Deactivate an account so it can no longer log in
    DeactivateUser(DeactivateUserArgs),

    /// Drop blacklisted refresh tokens that have expired
    FlushExpiredTokens,
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on (overrides config)
    #[arg(long)]
    pub listen: Option<String>,

    /// Do not run the overdue sweep and archive cleanup timers
    #[arg(long)]
    pub no_scheduler: bool,
}

#[derive(Args, Debug)]
pub struct WebArgs {
    /// Address to listen on (overrides config)
    #[arg(long)]
    pub listen: Option<String>,

    /// Base URL of the API server (overrides config)
    #[arg(long)]
    pub api_base_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Retention window in days (default: scheduler.retention_days)
    #[arg(long)]
    pub days: Option<i64>,
}

#[derive(Args, Debug)]
pub struct CreateUserArgs {
    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,

    #[arg(long, default_value = "")]
    pub nickname: String,

    /// Grant staff privileges
    #[arg(long)]
    pub staff: bool,

    /// Grant superuser privileges (implies --staff)
    #[arg(long)]
    pub superuser: bool,
}

#[derive(Args, Debug)]
pub struct DeactivateUserArgs {
    #[arg(long)]
    pub username: String,
}
