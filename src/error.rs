use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed range or identifier, rejected before any request is made.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The origin looks down: too many connection failures in a row.
    #[error(
        "Origin unreachable: {consecutive_failures} consecutive connection failures (last: {last_identifier})"
    )]
    OutageDetected {
        consecutive_failures: usize,
        last_identifier: String,
    },

    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Toml Error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    pub fn is_outage(&self) -> bool {
        matches!(self, Error::OutageDetected { .. })
    }
}
