//! TaskGenius
//!
//! Personal task manager: natural-language task entry, priority scoring and
//! reminder delivery behind a JSON HTTP API.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use taskgenius::api::{AppState, start_server};
use taskgenius::auth::TokenSigner;
use taskgenius::cli::{Cli, Command, ExportArgs};
use taskgenius::config::Config;
use taskgenius::db::{Database, now_local};
use taskgenius::export::{ExportFormat, render};
use taskgenius::logging::{LogTarget, init_logging};
use taskgenius::notify::build_notifier;
use taskgenius::parser::parse_task_text;
use taskgenius::reminder::ReminderScheduler;
use taskgenius::scorer::build_scorer;
use tracing::{info, warn};

/// Load config and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.clone();
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

fn open_database(config: &Config) -> Result<Arc<Database>> {
    config.ensure_db_dir()?;
    let db = Database::open(&config.server.db_path).with_context(|| {
        format!(
            "failed to open database {}",
            config.server.db_path.display()
        )
    })?;
    info!("Database opened at {}", config.server.db_path.display());
    Ok(Arc::new(db))
}

async fn serve(config: Config) -> Result<()> {
    if config.auth.uses_default_secret() {
        warn!("Using the built-in JWT secret; set JWT_SECRET_KEY or auth.jwt_secret in production");
    }

    let db = open_database(&config)?;
    let scorer = build_scorer(&config.scorer)?;
    info!("Priority scorer: {}", scorer.name());

    let tokens = TokenSigner::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);
    let state = AppState::new(Arc::clone(&db), scorer, tokens);

    let reminders = if config.reminders.enabled {
        let notifier = build_notifier(&config.mail)?;
        let scheduler = ReminderScheduler::new(
            Arc::clone(&db),
            notifier,
            Duration::from_secs(config.reminders.interval_secs),
        );
        Some(scheduler.spawn())
    } else {
        info!("Reminder worker disabled");
        None
    };

    let (shutdown_tx, addr) = start_server(state, &config.server.host, config.server.port).await?;
    info!("TaskGenius {} ready on http://{}", env!("CARGO_PKG_VERSION"), addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    let _ = shutdown_tx.send(());
    if let Some(handle) = reminders {
        handle.shutdown();
    }
    Ok(())
}

async fn remind_once(config: Config) -> Result<()> {
    let db = open_database(&config)?;
    let notifier = build_notifier(&config.mail)?;
    let scheduler = ReminderScheduler::new(
        db,
        notifier,
        Duration::from_secs(config.reminders.interval_secs),
    );
    let report = scheduler.run_cycle(now_local()).await?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn export(config: Config, args: ExportArgs) -> Result<()> {
    let Some(format) = ExportFormat::parse(&args.format) else {
        bail!(
            "unsupported export format '{}': expected csv, json or markdown",
            args.format
        );
    };

    let db = open_database(&config)?;
    let email = args.email.trim().to_lowercase();
    let Some(user) = db.get_user_by_email(&email)? else {
        bail!("no user registered with email {}", email);
    };

    let tasks = db.all_tasks(user.id)?;
    let output = render(&tasks, format)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Exported {} tasks to {}", tasks.len(), path.display());
        }
        None => {
            std::io::stdout().write_all(output.as_bytes())?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::Parse { text }) => {
            let parsed = parse_task_text(&text.join(" "), now_local());
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(())
        }
        Some(Command::Remind) => remind_once(config).await,
        Some(Command::Export(args)) => export(config, args),
    }
}
