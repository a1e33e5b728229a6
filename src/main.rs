use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process::ExitCode;

use promptsmith::cli::{Cli, Commands};
use promptsmith::config::Config;
use promptsmith::error::ConfigError;

/// Log to stderr, or to a file while the terminal UI owns the screen
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if log_file.is_some() { "info" } else { "warn" },
    ));

    if let Some(path) = log_file {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create .promptsmith directory")?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = promptsmith::command_or_default(&cli);
    let home = Config::default().home;

    let log_file = (command == Commands::Chat).then(|| home.join("promptsmith.log"));
    if let Err(e) = init_logging(log_file.as_deref()) {
        eprintln!("❌ {:#}", e);
        return ExitCode::FAILURE;
    }

    match promptsmith::run(command, &home, &cli.overrides, |name| std::env::var(name).ok()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is::<ConfigError>() => {
            eprintln!("❌ Configuration error: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
