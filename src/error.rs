//! Error types for mergeplay
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, precondition violated)
//! - 4: Operation failed (git error, merge conflict, failed scenario)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the mergeplay CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for mergeplay operations
#[derive(Error, Debug)]
pub enum Error {
    // Preconditions and user errors (exit code 2)
    #[error("Target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("Invalid feature name '{0}': feature names must be non-empty and contain no whitespace")]
    InvalidFeatureName(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Operation failures (exit code 4)
    #[error("git command failed in {cwd}: {command}\n{output}")]
    GitFailed {
        cwd: PathBuf,
        command: String,
        output: String,
    },

    #[error("Git inspection error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Presentation failed: {0}")]
    Presentation(String),

    #[error("Scenario failed: {failed} task(s) did not complete; first failure: {first}")]
    ScenarioFailed { failed: usize, first: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::TargetExists(_)
            | Error::InvalidFeatureName(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            Error::GitFailed { .. }
            | Error::Git(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Presentation(_)
            | Error::ScenarioFailed { .. }
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output, when the variant carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::GitFailed {
                cwd,
                command,
                output,
            } => Some(serde_json::json!({
                "cwd": cwd.display().to_string(),
                "command": command,
                "output": output,
            })),
            Error::TargetExists(path) => Some(serde_json::json!({
                "path": path.display().to_string(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for mergeplay operations
pub type Result<T> = std::result::Result<T, Error>;
