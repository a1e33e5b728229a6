use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::prompts::PromptLanguage;
use crate::session::MemoryPolicy;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key into `model_providers`
    pub provider: String,

    /// Model identifier; must be listed by the provider
    pub model: String,

    /// Consume replies incrementally
    pub stream: bool,

    /// Whether history survives across submissions
    pub memory: MemoryPolicy,

    /// Language of the system instruction
    pub language: PromptLanguage,

    pub temperature: f32,
    pub max_tokens: u32,

    /// Transport timeout; the only cancellation there is
    pub timeout_secs: u64,

    /// Model provider configuration
    pub model_providers: BTreeMap<String, ModelProvider>,

    /// Home directory for config, secrets and logs
    #[serde(skip)]
    pub home: PathBuf,
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProvider {
    pub name: String,
    pub base_url: String,
    pub api_key_env: String,
    pub models: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promptsmith");

        Config {
            provider: "groq".to_string(),
            model: GROQ_MODELS[0].to_string(),
            stream: true,
            memory: MemoryPolicy::default(),
            language: PromptLanguage::default(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout_secs: 60,
            model_providers: default_providers(),
            home,
        }
    }
}

const GROQ_MODELS: [&str; 4] = [
    "meta-llama/llama-4-maverick-17b-128e-instruct",
    "llama-3.3-70b-versatile",
    "llama-3.1-8b-instant",
    "qwen/qwen3-32b",
];

fn default_providers() -> BTreeMap<String, ModelProvider> {
    let mut providers = BTreeMap::new();
    providers.insert("groq".to_string(), ModelProvider {
        name: "Groq".to_string(),
        base_url: "https://api.groq.com/openai/v1".to_string(),
        api_key_env: "GROQ_API_KEY".to_string(),
        models: GROQ_MODELS.iter().map(|m| m.to_string()).collect(),
    });
    providers.insert("openai".to_string(), ModelProvider {
        name: "OpenAI".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
        api_key_env: "OPENAI_API_KEY".to_string(),
        models: vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()],
    });
    providers.insert("openrouter".to_string(), ModelProvider {
        name: "OpenRouter".to_string(),
        base_url: "https://openrouter.ai/api/v1".to_string(),
        api_key_env: "OPENROUTER_API_KEY".to_string(),
        models: vec![
            "openai/gpt-4o-mini".to_string(),
            "anthropic/claude-3.5-sonnet".to_string(),
            "meta-llama/llama-3.3-70b-instruct".to_string(),
        ],
    });
    providers
}

impl Config {
    /// Load `config.toml` from `home`, falling back to defaults when absent
    pub fn load_from(home: &Path) -> Result<Self, ConfigError> {
        let config_path = home.join("config.toml");

        let (mut config, model_given) = if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                path: config_path.clone(),
                source,
            })?;
            let parse_error = |source| ConfigError::Parse {
                path: config_path.clone(),
                source,
            };
            let value = toml::from_str::<toml::Value>(&content).map_err(parse_error)?;
            let model_given = value.get("model").is_some();
            (value.try_into::<Config>().map_err(parse_error)?, model_given)
        } else {
            (Config::default(), true)
        };

        // A file that lists only some providers keeps the built-in ones.
        for (id, provider) in default_providers() {
            config.model_providers.entry(id).or_insert(provider);
        }

        // Without an explicit model, use the chosen provider's first one.
        if !model_given {
            let provider = config.provider.clone();
            config.set_provider(&provider)?;
        }

        config.home = home.to_path_buf();
        Ok(config)
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.home.join("secrets.toml")
    }

    /// Get the current model provider
    pub fn current_provider(&self) -> Result<&ModelProvider, ConfigError> {
        self.model_providers
            .get(&self.provider)
            .ok_or_else(|| ConfigError::UnknownProvider(self.provider.clone()))
    }

    /// Switch provider, resetting the model to the provider's first one
    pub fn set_provider(&mut self, provider: &str) -> Result<(), ConfigError> {
        let entry = self
            .model_providers
            .get(provider)
            .ok_or_else(|| ConfigError::UnknownProvider(provider.to_string()))?;
        if !entry.models.contains(&self.model) {
            self.model = entry.models.first().cloned().unwrap_or_default();
        }
        self.provider = provider.to_string();
        Ok(())
    }

    /// Select a model from the current provider's enumerated list
    pub fn set_model(&mut self, model: &str) -> Result<(), ConfigError> {
        let provider = self.current_provider()?;
        if !provider.models.iter().any(|m| m == model) {
            return Err(ConfigError::UnknownModel {
                provider: provider.name.clone(),
                model: model.to_string(),
                available: provider.models.join(", "),
            });
        }
        self.model = model.to_string();
        Ok(())
    }

    /// Check the selected provider and model exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        let model = self.model.clone();
        self.clone().set_model(&model)
    }

    /// Resolve the API key: explicit value, then the secrets file, then the
    /// provider's environment variable.
    pub fn resolve_api_key_with<F>(
        &self,
        explicit: Option<&str>,
        env: F,
    ) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = self.current_provider()?;

        if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }

        if let Some(key) = self.secret_from_file(&provider.api_key_env)? {
            log::debug!("Using {} from {}", provider.api_key_env, self.secrets_path().display());
            return Ok(key);
        }

        if let Some(key) = env(&provider.api_key_env).filter(|k| !k.trim().is_empty()) {
            log::debug!("Using {} from environment", provider.api_key_env);
            return Ok(key);
        }

        Err(ConfigError::MissingCredential {
            provider: provider.name.clone(),
            env_var: provider.api_key_env.clone(),
            secrets_path: self.secrets_path(),
        })
    }

    fn secret_from_file(&self, name: &str) -> Result<Option<String>, ConfigError> {
        let path = self.secrets_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let secrets: BTreeMap<String, toml::Value> =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;

        Ok(secrets
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|k| !k.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.provider, "groq");
        assert_eq!(config.model, "meta-llama/llama-4-maverick-17b-128e-instruct");
        assert_eq!(config.memory, MemoryPolicy::SingleTurn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn provider_without_model_uses_its_first_model() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "provider = \"openai\"\n").unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_unknown_model_is_still_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "provider = \"openai\"\nmodel = \"llama-3.3-70b-versatile\"\n",
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownModel { .. })
        ));
    }

    #[test]
    fn partial_file_overrides_and_keeps_builtin_providers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            r#"
provider = "local"
model = "tiny"
memory = "multi-turn"
stream = false

[model_providers.local]
name = "Local"
base_url = "http://localhost:8080/v1"
api_key_env = "LOCAL_KEY"
models = ["tiny"]
"#,
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.provider, "local");
        assert_eq!(config.memory, MemoryPolicy::MultiTurn);
        assert!(!config.stream);
        assert_eq!(config.max_tokens, 2048);
        assert!(config.model_providers.contains_key("groq"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unparsable_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "provider = [").unwrap();
        let err = Config::load_from(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn model_must_come_from_the_provider_list() {
        let mut config = Config::default();
        assert!(config.set_model("llama-3.1-8b-instant").is_ok());
        let err = config.set_model("gpt-4o").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel { .. }));
        assert_eq!(config.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn switching_provider_picks_its_first_model() {
        let mut config = Config::default();
        config.set_provider("openai").unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.set_provider("nope").is_err());
    }

    #[test]
    fn explicit_key_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.toml"), "GROQ_API_KEY = \"from-file\"").unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        let key = config
            .resolve_api_key_with(Some("mine"), |_| Some("from-env".into()))
            .unwrap();
        assert_eq!(key, "mine");
    }

    #[test]
    fn secrets_file_precedes_environment() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.toml"), "GROQ_API_KEY = \"from-file\"").unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        let key = config
            .resolve_api_key_with(None, |_| Some("from-env".into()))
            .unwrap();
        assert_eq!(key, "from-file");
    }

    #[test]
    fn environment_is_the_last_source() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        let key = config
            .resolve_api_key_with(None, |name| {
                (name == "GROQ_API_KEY").then(|| "from-env".to_string())
            })
            .unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn missing_key_names_both_sources() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        let err = config.resolve_api_key_with(Some("  "), no_env).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
        assert!(message.contains("GROQ_API_KEY"));
        assert!(message.contains("secrets.toml"));
    }
}
