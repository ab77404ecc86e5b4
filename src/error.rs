use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Worker(String),
}

impl From<toml::de::Error> for ShellError {
    fn from(e: toml::de::Error) -> Self {
        ShellError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for ShellError {
    fn from(e: toml::ser::Error) -> Self {
        ShellError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
