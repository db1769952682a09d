use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BapError {
    #[error("skipped: {0}")]
    Skip(String),

    #[error("{0}")]
    UserInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("missing config file kira-bap.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Skip,
    User,
    Internal,
}

impl BapError {
    pub fn user(message: impl Into<String>) -> Self {
        BapError::UserInput(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BapError::Skip(_) => ErrorKind::Skip,
            BapError::UserInput(_)
            | BapError::Configuration(_)
            | BapError::UnknownService(_)
            | BapError::MissingConfig
            | BapError::ConfigRead(_)
            | BapError::ConfigParse(_) => ErrorKind::User,
            BapError::Internal(_)
            | BapError::Filesystem(_)
            | BapError::Json(_)
            | BapError::Scheduler(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for BapError {
    fn from(err: serde_json::Error) -> Self {
        BapError::Json(err.to_string())
    }
}
