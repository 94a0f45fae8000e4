//! `vibecheck` - CLI for the security checklist
//!
//! This binary wires the checklist session to a SQLite store that serves as
//! both the key-value storage and the analytics delivery sink.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;

use vibecheck::analytics::Analytics;
use vibecheck::cli::interactive;
use vibecheck::cli::{Cli, Command, ConfigCommand, ConsentCommand, EventsCommand};
use vibecheck::storage::SqliteStore;
use vibecheck::{
    init_logging, Checklist, ChecklistSession, Config, ConsentState, DebouncedPersister,
    TokioScheduler,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config =
        Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Configuration commands don't touch the database
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(&config, config_cmd),
        command => command,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(&config, command))
}

async fn run(config: &Config, command: Command) -> anyhow::Result<()> {
    let db_path = config.database_path();
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?,
    );

    let mut analytics = Analytics::from_config(config, store.clone(), store.clone());
    analytics.restore_consent();

    let scheduler = Arc::new(TokioScheduler::current()?);
    let persister = DebouncedPersister::from_config(config, store.clone(), scheduler);
    let checklist =
        Checklist::from_config(&config.checklist).context("failed to load checklist")?;

    let mut session = ChecklistSession::new(checklist, analytics, persister);
    let result = dispatch(config, &mut session, &store, command).await;
    session.shutdown();
    result
}

async fn dispatch(
    config: &Config,
    session: &mut ChecklistSession,
    store: &SqliteStore,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Consent(cmd) => handle_consent(session, store, &cmd)?,
        Command::Toggle(cmd) => {
            let checked = !cmd.uncheck;
            session.toggle(&cmd.item_id, checked)?;
            let progress = session.progress();
            println!(
                "{} {} ({}/{}, {:.0}%)",
                if checked { "Checked" } else { "Unchecked" },
                cmd.item_id,
                progress.checked,
                progress.total,
                progress.percent()
            );
        }
        Command::Clear(cmd) => {
            let cleared = session.clear_section(&cmd.section_id)?;
            println!("Cleared {cleared} item(s) in {}", cmd.section_id);
        }
        Command::Status(cmd) => handle_status(session, store, cmd.json)?,
        Command::Theme(cmd) => session.set_theme(&cmd.name),
        Command::View(cmd) => session.view_page(&cmd.path, cmd.title.as_deref()),
        Command::Link(cmd) => {
            session.follow_link(&cmd.url, &cmd.text, &cmd.location)?;
            println!("Followed {}", cmd.url);
        }
        Command::Events(cmd) => handle_events(store, &cmd)?,
        Command::Session => {
            let stdin = BufReader::new(tokio::io::stdin());
            interactive::run(session, stdin, std::io::stdout()).await?;
        }
        Command::Config(cmd) => handle_config(config, cmd)?,
    }
    Ok(())
}

fn handle_consent(
    session: &mut ChecklistSession,
    store: &SqliteStore,
    cmd: &ConsentCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConsentCommand::Grant => {
            session.set_consent(ConsentState::Granted);
            println!("Analytics consent granted.");
        }
        ConsentCommand::Deny => {
            session.set_consent(ConsentState::Denied);
            println!("Analytics consent denied.");
        }
        ConsentCommand::Status { json } => {
            let consent = session.consent();
            let history = store.consent_history(5)?;
            if *json {
                let status = serde_json::json!({
                    "consent": consent,
                    "history": history,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!(
                    "Consent: {}",
                    consent.map_or("not set", |state| state.as_str())
                );
                for update in history {
                    println!("  {}  {}", update.timestamp.to_rfc3339(), update.state);
                }
            }
        }
    }
    Ok(())
}

fn handle_status(
    session: &ChecklistSession,
    store: &SqliteStore,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        let checklist = session.checklist();
        let sections: Vec<_> = checklist
            .sections
            .iter()
            .map(|section| {
                let progress = section.progress(session.state());
                serde_json::json!({
                    "id": section.id,
                    "title": section.title,
                    "checked": progress.checked,
                    "total": progress.total,
                    "complete": progress.is_complete(),
                })
            })
            .collect();
        let overall = session.progress();
        let status = serde_json::json!({
            "title": checklist.title,
            "checked": overall.checked,
            "total": overall.total,
            "percent": overall.percent(),
            "sections": sections,
            "consent": session.consent(),
            "queued_events": session.analytics().queued_len(),
            "storage": store.stats()?,
            "database_path": store.path(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        interactive::write_status(session, &mut std::io::stdout())?;
        let stats = store.stats()?;
        println!();
        println!("Database:         {}", store.path().display());
        println!("Delivered events: {}", stats.total_events);
    }
    Ok(())
}

fn handle_events(store: &SqliteStore, cmd: &EventsCommand) -> anyhow::Result<()> {
    let events = match &cmd.name {
        Some(name) => store.events_named(name, cmd.limit)?,
        None => store.recent_events(cmd.limit)?,
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No events delivered yet.");
        return Ok(());
    }
    for event in events {
        println!(
            "{:>5}  {}  {:<20}  {}",
            event.id,
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.name,
            serde_json::Value::Object(event.record)
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Analytics]");
                println!("  Consent key:        {}", config.analytics.consent_key);
                match config.max_queued_events() {
                    Some(max) => println!("  Max queued events:  {max}"),
                    None => println!("  Max queued events:  unbounded"),
                }
                println!();
                println!("[Persistence]");
                println!("  State key:          {}", config.persistence.state_key);
                println!("  Debounce (ms):      {}", config.persistence.debounce_ms);
                println!();
                println!("[Checklist]");
                match &config.checklist.path {
                    Some(path) => println!("  Path:               {}", path.display()),
                    None => println!("  Path:               (built-in)"),
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
