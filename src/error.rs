use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid override: {0}")]
    Override(String),

    #[error("Model provider `{id}` not found (available: {})", join_ids(.available))]
    ProviderNotFound { id: String, available: Vec<String> },

    #[error("Config profile `{0}` not found")]
    ProfileNotFound(String),

    #[error("Unknown local provider `{0}` (expected `ollama` or `lmstudio`)")]
    UnknownLocalProvider(String),

    #[error("Missing environment variable `{var}`{}", instructions_suffix(.instructions))]
    MissingEnvVar {
        var: String,
        instructions: Option<String>,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({platform}): {message}")]
    Api {
        platform: String,
        message: String,
        status_code: Option<u16>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited by {platform}")]
    RateLimit {
        platform: String,
        retry_after_secs: Option<u64>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn override_(msg: impl Into<String>) -> Self {
        Self::Override(msg.into())
    }

    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    pub fn api_with_status(
        platform: impl Into<String>,
        message: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self::Api {
            platform: platform.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

fn join_ids(ids: &[String]) -> String {
    ids.join(", ")
}

fn instructions_suffix(instructions: &Option<String>) -> String {
    instructions
        .as_deref()
        .map(|i| format!(". {i}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
