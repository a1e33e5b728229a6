use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, reported before any request is made
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no API key configured for {provider}.\n\n\
         - add `{env_var} = \"...\"` to {path}, or\n\
         - set the environment variable `{env_var}`",
        path = .secrets_path.display()
    )]
    MissingCredential {
        provider: String,
        env_var: String,
        secrets_path: PathBuf,
    },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("model '{model}' is not offered by {provider}; available: {available}")]
    UnknownModel {
        provider: String,
        model: String,
        available: String,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure of a single model call. Shown to the user as-is.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("invalid API key header: {0}")]
    InvalidKey(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("the model returned no choices")]
    Empty,

    #[error("stream error: {0}")]
    Stream(String),
}
