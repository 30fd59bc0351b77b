use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrewError>;

#[derive(Debug, Error)]
pub enum BrewError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("history corruption: {0}")]
    HistoryCorruption(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
