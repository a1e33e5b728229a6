use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::error::ConfigError;
use crate::prompts::PromptLanguage;
use crate::session::MemoryPolicy;

#[derive(Parser, Debug)]
#[command(name = "promptsmith")]
#[command(version)]
#[command(about = "Turn a rough prompt into a structured prompt template", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Optimize one prompt and print the result
    Optimize {
        /// Prompt text; read from stdin when omitted
        text: Option<String>,
        /// Print the model's reply without formatting
        #[arg(long)]
        raw: bool,
    },
    /// List the models each provider offers
    Models,
}

/// Flags that take precedence over `config.toml`
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Provider id from the config (groq, openai, openrouter, ...)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model identifier from the provider's list
    #[arg(long, short, global = true)]
    pub model: Option<String>,

    /// Use this API key instead of the secrets file or environment
    #[arg(long, global = true, env = "PROMPTSMITH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// single-turn or multi-turn
    #[arg(long, global = true)]
    pub memory: Option<MemoryPolicy>,

    /// Instruction language (en, ko)
    #[arg(long, global = true)]
    pub language: Option<PromptLanguage>,

    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    #[arg(long, global = true)]
    pub max_tokens: Option<u32>,

    /// Receive the reply incrementally
    #[arg(long, global = true, conflicts_with = "no_stream")]
    pub stream: bool,

    /// Wait for the whole reply
    #[arg(long, global = true)]
    pub no_stream: bool,
}

impl Overrides {
    /// Apply flags on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(provider) = &self.provider {
            config.set_provider(provider)?;
        }
        if let Some(model) = &self.model {
            config.set_model(model)?;
        }
        if let Some(memory) = self.memory {
            config.memory = memory;
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if self.stream {
            config.stream = true;
        }
        if self.no_stream {
            config.stream = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_chat() {
        let cli = Cli::try_parse_from(["promptsmith"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn global_flags_apply_to_config() {
        let cli = Cli::try_parse_from([
            "promptsmith",
            "optimize",
            "travel bot",
            "--model",
            "llama-3.1-8b-instant",
            "--memory",
            "multi-turn",
            "--language",
            "ko",
            "--no-stream",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Some(Commands::Optimize { text: Some("travel bot".into()), raw: false })
        );

        let mut config = Config::default();
        cli.overrides.apply(&mut config).unwrap();
        assert_eq!(config.model, "llama-3.1-8b-instant");
        assert_eq!(config.memory, MemoryPolicy::MultiTurn);
        assert_eq!(config.language, PromptLanguage::Ko);
        assert!(!config.stream);
    }

    #[test]
    fn stream_flags_conflict() {
        assert!(Cli::try_parse_from(["promptsmith", "--stream", "--no-stream"]).is_err());
    }

    #[test]
    fn unknown_model_is_rejected() {
        let cli = Cli::try_parse_from(["promptsmith", "--model", "gpt-4o"]).unwrap();
        let mut config = Config::default();
        assert!(matches!(
            cli.overrides.apply(&mut config),
            Err(ConfigError::UnknownModel { .. })
        ));
    }

    #[test]
    fn bad_memory_value_fails_to_parse() {
        assert!(Cli::try_parse_from(["promptsmith", "--memory", "forever"]).is_err());
    }
}
