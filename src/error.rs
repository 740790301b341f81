use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    // Construction errors: local, synchronous, never retried.
    #[error("Unsupported script language: {0}")]
    UnsupportedLanguage(String),

    #[error("Job name must not be empty")]
    EmptyJobName,

    #[error("Task name must not be empty")]
    EmptyTaskName,

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Task {task} depends on unknown task {dependency}")]
    UnresolvedDependency { task: String, dependency: String },

    #[error("Task {task} names unknown flow target {target}")]
    UnresolvedFlowTarget { task: String, target: String },

    #[error("Invalid flow script on task {task}: {reason}")]
    InvalidFlowPlacement { task: String, reason: String },

    #[error("Task {task} sets mutually exclusive fields: {fields}")]
    ConflictingFields { task: String, fields: String },

    #[error("Dependency cycle detected at task: {0}")]
    Cycle(String),

    #[error("Unbalanced flow blocks: {0}")]
    InvalidBlockPairing(String),

    // Session errors
    #[error("Not connected to the execution service")]
    NotConnected,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("No cached credentials to reconnect with")]
    MissingCredentials,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // Remote errors, surfaced as-is
    #[error("Execution service error: {0}")]
    Remote(String),

    #[error("No result for task {task} in job {job}")]
    TaskResultNotFound { job: String, task: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Errors raised while building or compiling a job graph, before any
    /// network call was made.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedLanguage(_)
                | Error::EmptyJobName
                | Error::EmptyTaskName
                | Error::DuplicateTask(_)
                | Error::UnresolvedDependency { .. }
                | Error::UnresolvedFlowTarget { .. }
                | Error::InvalidFlowPlacement { .. }
                | Error::ConflictingFields { .. }
                | Error::Cycle(_)
                | Error::InvalidBlockPairing(_)
        )
    }

    /// Errors tied to the gateway session. `SessionExpired` is the one a
    /// caller can recover from with `reconnect()`.
    pub fn is_session(&self) -> bool {
        matches!(
            self,
            Error::NotConnected
                | Error::Authentication(_)
                | Error::SessionExpired
                | Error::MissingCredentials
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
