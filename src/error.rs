//! Build error types.
//!
//! Dependency-scan problems and failed feature checks never show up here: they are
//! absorbed where they happen. Everything in [`BuildError`] aborts a build.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

/// A compiler invocation that exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub file: PathBuf,
    pub command: String,
    /// `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub output: String,
}

/// An archiver or linker invocation that exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub command: String,
    pub status: Option<i32>,
    pub output: String,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Compilation of {} failed ({} job(s) cancelled)", .failure.file.display(), .cancelled)]
    Compile {
        failure: CompileFailure,
        cancelled: usize,
    },

    #[error("Linking failed: {0}")]
    Link(LinkFailure),

    #[error("Scheduling failure: {0}")]
    Scheduling(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuildError {
    pub fn config<E: fmt::Display>(e: E) -> Self {
        Self::Configuration(e.to_string())
    }

    /// Captured diagnostics of the failing tool, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            BuildError::Compile { failure, .. } => Some(&failure.output),
            BuildError::Link(failure) => Some(&failure.output),
            _ => None,
        }
    }

    /// The command line to rerun by hand, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            BuildError::Compile { failure, .. } => Some(&failure.command),
            BuildError::Link(failure) => Some(&failure.command),
            _ => None,
        }
    }
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})\n  command: {}\n{}",
            self.file.display(),
            describe_status(self.status),
            self.command,
            self.output
        )
    }
}

impl fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n  command: {}\n{}",
            describe_status(self.status),
            self.command,
            self.output
        )
    }
}
