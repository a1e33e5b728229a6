pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod turn;
pub mod ui;

use anyhow::Result;
use log::info;
use std::path::Path;

use cli::{Cli, Commands, Overrides};
use config::Config;
use error::ConfigError;
use turn::TurnHandler;

/// Load the configuration and apply command-line flags
pub fn load_config(home: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
    let mut config = Config::load_from(home)?;
    overrides.apply(&mut config)?;
    Ok(config)
}

/// Load the configuration, apply flags and resolve the API key.
///
/// Everything that can make the program unusable fails here, before any
/// prompt is read or request is sent.
pub fn prepare<F>(home: &Path, overrides: &Overrides, env: F) -> Result<(Config, String), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = load_config(home, overrides)?;
    config.validate()?;
    let api_key = config.resolve_api_key_with(overrides.api_key.as_deref(), env)?;
    Ok((config, api_key))
}

/// Run the selected command.
///
/// Listing models needs no API key; every other command goes through
/// [`prepare`] first. Configuration failures come back as [`ConfigError`].
pub async fn run<F>(command: Commands, home: &Path, overrides: &Overrides, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    match command {
        Commands::Models => {
            let config = load_config(home, overrides)?;
            commands::list_models(&config, &mut std::io::stdout())
        }
        Commands::Optimize { text, raw } => {
            let (config, handler) = start(home, overrides, env)?;
            commands::optimize(&handler, commands::new_session(&config), text, raw).await
        }
        Commands::Chat => {
            let (config, handler) = start(home, overrides, env)?;
            let session = commands::new_session(&config);
            let manager = ui::conversation::ConversationManager::new(config, handler, session);
            ui::run(manager).await
        }
    }
}

fn start<F>(home: &Path, overrides: &Overrides, env: F) -> Result<(Config, TurnHandler)>
where
    F: Fn(&str) -> Option<String>,
{
    let (config, api_key) = prepare(home, overrides, env)?;
    log_config(&config);
    let handler = commands::build_handler(&config, &api_key)?;
    Ok((config, handler))
}

fn log_config(config: &Config) {
    info!("--- Configuration ---");
    info!("Provider: {}", config.provider);
    info!("Model: {}", config.model);
    info!("Streaming: {}", config.stream);
    info!("Memory: {}", config.memory);
    info!("Language: {}", config.language);
    info!("---------------------");
}

/// Command to run when none was given
pub fn command_or_default(cli: &Cli) -> Commands {
    cli.command.clone().unwrap_or(Commands::Chat)
}
