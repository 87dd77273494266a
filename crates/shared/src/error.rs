use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Feed parse error: {0}")]
    Feed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Summarizer error: {0}")]
    Summarizer(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
