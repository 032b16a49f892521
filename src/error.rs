use std::io;
use std::result::Result as StdResult;
use teloxide::RequestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("pair not found: {0}")]
    PairNotFound(String),
    #[error("ambiguous pair match for {0}")]
    AmbiguousPair(String),
    #[error("candle source unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("empty candle series: {0}")]
    EmptySeries(String),
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),
    #[error("price lookup failed: {0}")]
    PriceLookup(String),
    #[error("validation error in field `{field}`: {reason}")]
    Validation { field: String, reason: String },
    #[error("chart rendering failed: {0}")]
    Render(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("telegram error: {0}")]
    Telegram(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::UpstreamUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    // serde's message names the offending field
    fn from(err: serde_json::Error) -> Self {
        Error::validation("candle", err.to_string())
    }
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::Telegram(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(err.to_string())
    }
}

pub type Result<T> = StdResult<T, Error>;
