//! All error types for the mdpo-sync crate.
//!
//! Configuration problems surface before any document is processed; I/O and
//! parse failures abort the build and trigger the failure cleanup.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown format `{0}`")]
    UnknownFormat(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid threshold `{0}`: expected an integer >= 0 or a percentage like \"50%\"")]
    InvalidThreshold(String),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}

impl Error {
    /// Creates a new configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Creates a parse error pointing at a line of a catalog file.
    pub fn parse_error(path: impl AsRef<Path>, line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.as_ref().to_path_buf(),
            line,
            message: message.into(),
        }
    }

    /// Returns true for errors raised while validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::InvalidThreshold(_) | Error::Toml(_)
        )
    }
}
