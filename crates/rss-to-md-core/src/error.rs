use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    MethodNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Wrapper every conversion stage failure collapses into
    #[error("{message}")]
    Processing { cause: ErrorKind, message: String },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine-readable error kind reported to protocol clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "InvalidParamsError")]
    InvalidParams,
    #[serde(rename = "MethodNotFoundError")]
    MethodNotFound,
    #[serde(rename = "NetworkError")]
    Network,
    #[serde(rename = "ParseError")]
    Parse,
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "ProcessingError")]
    Processing,
    #[serde(rename = "InternalError")]
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParams(_) => ErrorKind::InvalidParams,
            Error::MethodNotFound(_) => ErrorKind::MethodNotFound,
            Error::Network(_) => ErrorKind::Network,
            Error::Parse(_) => ErrorKind::Parse,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Processing { .. } => ErrorKind::Processing,
            Error::Protocol(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                ErrorKind::Internal
            },
        }
    }

    /// Wrap this error for the orchestration boundary, keeping its message as a suffix
    pub fn into_processing(self) -> Self {
        match self {
            Error::Processing { .. } => self,
            other => Error::Processing {
                cause: other.kind(),
                message: format!("Failed to process RSS feed: {}", other),
            },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
