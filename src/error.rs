//! Error types for argument validation and job submission.

use thiserror::Error;

/// Rejected command-line value.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("'{0}' is not a valid wall time (expected MM, MM:SS, HH:MM:SS, D-HH, D-HH:MM or D-HH:MM:SS)")]
    WallTime(String),
    #[error("'{0}' is not a valid job ID")]
    JobId(String),
    #[error("scheduler command must not be empty")]
    EmptyCommand,
    #[error("invalid scheduler command: {0}")]
    Command(String),
}

/// Failure of a single submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("failed to execute {program}: {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },
    #[error("{program} failed (exit_code={exit_code:?}): {stderr}")]
    Failed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("could not parse job ID from {program} output: {stdout:?}")]
    UnparsableJobId { program: String, stdout: String },
}

/// Batch script could not be written; nothing has been submitted yet.
#[derive(Debug, Error)]
#[error("failed to write batch script {}: {error}", .path.display())]
pub struct ScriptError {
    pub path: std::path::PathBuf,
    pub error: std::io::Error,
}
