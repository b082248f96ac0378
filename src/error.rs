//! Per-layer error taxonomy. Internals propagate with `anyhow`/`?`; these
//! typed enums exist at the boundaries named in spec §7 so callers can
//! match on a specific failure kind instead of string-sniffing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("{reason}")]
    Denied {
        reason: String,
        suggestion: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unterminated quote starting at byte {0}")]
    UnterminatedQuote(usize),
    #[error("unterminated heredoc (expected delimiter `{0}`)")]
    UnterminatedHeredoc(String),
    #[error("empty command")]
    EmptyCommand,
    #[error("dangling pipe or chain operator")]
    DanglingOperator,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("gate `{gate}` failed to run: {message}")]
    RunFailure { gate: String, message: String },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("filesystem unavailable: {0}")]
    FsUnavailable(String),
    #[error("commit failed after retry: {0}")]
    CommitFailed(String),
    #[error("llm error: {0}")]
    Llm(String),
    #[error("aborted")]
    Aborted,
}
