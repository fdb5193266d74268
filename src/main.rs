mod config;
mod engine;
mod model;
mod ui;

use std::io::{self, IsTerminal};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{load_credential, AppConfig, Cli};
use crate::engine::engine::{Engine, EngineSettings};
use crate::engine::persistence::SnapshotStore;
use crate::ui::input::{prompt_username, pump};
use crate::ui::settings_io::load_settings;
use crate::ui::terminal::TerminalSurface;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("willow=info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = AppConfig::resolve(Cli::parse()).context("invalid configuration")?;
    info!(root = %config.config_root.display(), "configuration resolved");

    // Fatal before any thread starts.
    let api_key = load_credential(&config.key_file)?;
    let backend = config.backend(api_key);

    let ui_settings = load_settings(&config.config_root);
    let username = match &config.username {
        Some(name) => name.clone(),
        None => prompt_username(io::stdin().lock(), io::stdout())
            .context("failed to read username")?,
    };
    config.check_username(&username)?;

    println!(
        "Welcome, {}! You are chatting with {}. Type 'quit' to exit.",
        username, config.agent_name
    );

    let color = !config.no_color && io::stdout().is_terminal();
    let surface = TerminalSurface::new(io::stdout(), ui_settings, color);

    let mut settings = EngineSettings::new(username, config.agent_name.clone());
    settings.instructions_file = Some(config.instructions_file.clone());
    settings.poll_interval = config.poll_interval;
    settings.save_interval = config.save_interval;

    let store = SnapshotStore::new(config.history_file.clone());
    let (engine, input) = Engine::start(settings, store, backend, surface)?;
    let shutdown = engine.shutdown().clone();
    info!(entries = engine.log().len()?, "engine running");

    // Detached: a blocking stdin read must not hold up shutdown.
    thread::Builder::new()
        .name("human-input".into())
        .spawn(move || {
            if let Err(err) = pump(io::stdin().lock(), input) {
                warn!(component = "input", error = %err, "input pump ended");
            }
        })
        .context("failed to spawn input thread")?;

    engine.join()?;
    info!(origin = shutdown.origin().unwrap_or("unknown"), "shutdown complete");
    println!("All threads cleaned up. Application finished.");
    Ok(())
}
