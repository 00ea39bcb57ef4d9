//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{CleanupArgs, CreateUserArgs, DeactivateUserArgs, ServeArgs, WebArgs};
use crate::api;
use crate::api::validation::{validate_email, validate_nickname, validate_username};
use crate::auth::TokenService;
use crate::auth::password::{hash_password, validate_password};
use crate::config::{Config, MAX_RETENTION_DAYS};
use crate::db::{Database, now_ms};
use crate::scheduler::{self, jobs};
use crate::server::start_server;
use crate::state::AppState;
use crate::types::{NewUser, User};
use crate::web::{self, WebState};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn open_database(config: &Config) -> Result<Database> {
    config.ensure_db_dir()?;
    Database::open(&config.server.db_path)
        .with_context(|| format!("failed to open database {:?}", config.server.db_path))
}

/// Run the API server (and the scheduler) until ctrl-c.
pub async fn run_serve(
    mut config: Config,
    args: ServeArgs,
    config_path: Option<PathBuf>,
) -> Result<()> {
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    let secret = config.secret_key()?.to_string();

    info!("Starting taskhub v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Config: {:?}", path),
        None => info!("Config: defaults"),
    }
    info!("Database: {:?}", config.server.db_path);

    let db = open_database(&config)?;
    info!("Database initialized successfully");

    let tokens = TokenService::new(
        &secret,
        config.auth.access_token_ttl_secs,
        config.auth.refresh_token_ttl_secs,
    );
    let state = AppState::new(db.clone(), tokens, config.pagination);

    let scheduler = if config.scheduler.enabled && !args.no_scheduler {
        Some(scheduler::start(db, &config.scheduler)?)
    } else {
        info!("Scheduler disabled");
        None
    };

    let server = start_server(api::router(state), &config.server.listen_addr, "API server").await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    server.shutdown().await;
    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    Ok(())
}

/// Run the browser front end until ctrl-c.
pub async fn run_web(mut config: Config, args: WebArgs) -> Result<()> {
    if let Some(listen) = args.listen {
        config.web.listen_addr = listen;
    }
    if let Some(url) = args.api_base_url {
        config.web.api_base_url = url;
    }

    info!("Relaying to API at {}", config.web.api_base_url);
    let state = WebState::new(&config.web)?;

    let sessions = state.sessions().clone();
    let reaper = tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let evicted = sessions.evict_expired();
            if evicted > 0 {
                debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
            }
        }
    });

    let server = start_server(web::router(state), &config.web.listen_addr, "Front end").await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    server.shutdown().await;
    reaper.abort();
    Ok(())
}

pub fn run_sweep_overdue(config: &Config) -> Result<jobs::OverdueReport> {
    let db = open_database(config)?;
    let report = jobs::sweep_overdue(&db, Utc::now())?;
    info!(updated = report.updated, "Overdue sweep finished");
    Ok(report)
}

pub fn run_cleanup_archived(config: &Config, args: &CleanupArgs) -> Result<jobs::CleanupReport> {
    let days = args.days.unwrap_or(config.scheduler.retention_days);
    if !(0..=MAX_RETENTION_DAYS).contains(&days) {
        bail!("--days must be between 0 and {}", MAX_RETENTION_DAYS);
    }
    let db = open_database(config)?;
    let report = jobs::cleanup_archived(&db, Utc::now(), days)?;
    info!(deleted = report.deleted, retention_days = days, "Archive cleanup finished");
    Ok(report)
}

/// Create an account from the command line. Validation matches registration.
pub fn create_user(db: &Database, args: &CreateUserArgs) -> Result<User> {
    let username = args.username.trim();
    let email = args.email.trim();
    validate_username(username)?;
    validate_email(email)?;
    validate_nickname(&args.nickname)?;

    let problems = validate_password(&args.password, username, email);
    if !problems.is_empty() {
        bail!("password rejected: {}", problems.join(" "));
    }

    let user = db.create_user(&NewUser {
        username: username.to_string(),
        email: email.to_string(),
        nickname: args.nickname.clone(),
        password_hash: hash_password(&args.password)?,
        is_staff: args.staff || args.superuser,
        is_superuser: args.superuser,
    })?;
    info!(user_id = user.id, username = %user.username, staff = user.is_staff, "Created user");
    Ok(user)
}

pub fn run_create_user(config: &Config, args: &CreateUserArgs) -> Result<User> {
    let db = open_database(config)?;
    create_user(&db, args)
}

pub fn run_deactivate_user(config: &Config, args: &DeactivateUserArgs) -> Result<()> {
    let db = open_database(config)?;
    if !db.deactivate_user(&args.username)? {
        bail!("no active user named {:?}", args.username);
    }
    info!(username = %args.username, "Deactivated user");
    Ok(())
}

pub fn run_flush_expired_tokens(config: &Config) -> Result<usize> {
    let db = open_database(config)?;
    let removed = db.flush_expired_tokens(now_ms())?;
    info!(removed, "Flushed expired blacklist entries");
    Ok(removed)
}
