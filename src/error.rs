//! Central error types for gocpg.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic
//! `Display` and `From` implementations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum CpgError {
    /// IO operation failed (without path context - prefer IoWithPath when path is available)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO operation failed with path context for better error messages
    #[error("IO error at {path}: {error}")]
    IoWithPath {
        error: std::io::Error,
        path: PathBuf,
    },

    /// Failed to parse a Go source file
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// Tree-sitter grammar/loading error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// Invalid command-line argument or module specification
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Loader failure: no analyzable packages, unreadable module dir, etc.
    #[error("Loader error: {0}")]
    Loader(String),

    /// SQLite error during the persistence phase
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// JSON serialization error (property bags)
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Convenience type alias for Results using CpgError.
pub type Result<T> = std::result::Result<T, CpgError>;

impl CpgError {
    /// Create an IO error with path context.
    #[inline]
    pub fn io_with_path(error: std::io::Error, path: impl AsRef<Path>) -> Self {
        CpgError::IoWithPath {
            error,
            path: path.as_ref().to_path_buf(),
        }
    }
}
