use anyhow::{Context, Result};
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::config::Config;
use crate::llm::OpenAiCompatClient;
use crate::session::Session;
use crate::turn::{TurnHandler, TurnOutcome, TurnSettings};

/// Build the turn handler for the configured provider
pub fn build_handler(config: &Config, api_key: &str) -> Result<TurnHandler> {
    let client = OpenAiCompatClient::from_config(config, api_key)
        .context("Failed to create HTTP client")?;
    Ok(TurnHandler::new(Arc::new(client), TurnSettings::from_config(config)))
}

/// Fresh session following the configured memory policy
pub fn new_session(config: &Config) -> Session {
    Session::new(config.memory, Some(config.language.system_prompt().to_string()))
}

/// Print every provider and its models, marking the current selection
pub fn list_models(config: &Config, out: &mut impl Write) -> Result<()> {
    for (id, provider) in &config.model_providers {
        writeln!(out, "{} ({}) at {}", provider.name, id, provider.base_url)?;
        for model in &provider.models {
            let current = *id == config.provider && *model == config.model;
            let mark = if current { "*" } else { " " };
            writeln!(out, "  {} {}", mark, model)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Optimize a single prompt and print the result.
///
/// Fragments are echoed as they arrive when streaming to a raw output.
pub async fn optimize(
    handler: &TurnHandler,
    session: Session,
    text: Option<String>,
    raw: bool,
) -> Result<()> {
    let input = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read prompt from stdin")?;
            buf
        }
    };

    let echo = raw && handler.settings().stream;
    let turn = handler
        .handle_with(session, &input, |fragment| {
            if echo {
                print!("{}", fragment);
                let _ = io::stdout().flush();
            }
        })
        .await;

    match turn.outcome {
        TurnOutcome::Skipped => anyhow::bail!("Nothing to optimize: the prompt is empty"),
        TurnOutcome::Failed(e) => Err(anyhow::Error::new(e).context("The model call failed")),
        TurnOutcome::Answered(answer) => {
            if raw {
                if !echo {
                    print!("{}", answer.raw);
                }
                println!();
            } else {
                print!("{}", answer.formatted.to_plain_text());
            }
            Ok(())
        }
    }
}
