//! Error types for sticker-dl
//!
//! This module provides the error taxonomy used by the pipeline:
//! - Transient failures (remote fetches) that the retry executor may repeat
//! - Item-local failures that a whole-collection job logs and skips
//! - Job-fatal failures (workspace, archive, conversion on a single item)
//!
//! Each variant carries enough context (paths, formats, archive names) to diagnose the
//! failure from a log line alone.

use crate::types::TargetFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sticker-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sticker-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "archive.ceiling_bytes")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error talking to the remote sticker service (request URL stripped)
    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// The remote service refused the request or answered with unusable data
    #[error("remote service error: {0}")]
    Remote(String),

    /// Scratch directory allocation failed
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// Format conversion failed
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Archive packaging failed
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The outbound message sink could not deliver a message or file
    #[error("delivery error: {0}")]
    Delivery(String),

    /// A whole-collection job finished without a single converted item
    #[error("no item of '{base_name}' could be converted")]
    NothingConverted {
        /// Base name of the job
        base_name: String,
    },

    /// The job was cancelled by a session reset or shutdown
    #[error("job cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new events
    #[error("shutdown in progress: not accepting new events")]
    ShuttingDown,

    /// Operation not supported (missing binary, unconfigured collaborator, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Scratch directory errors
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The randomly named directory already exists (suffix collision)
    #[error("workspace {path} already exists")]
    AlreadyExists {
        /// The colliding directory
        path: PathBuf,
    },

    /// The directory could not be created
    #[error("failed to create workspace {path}: {reason}")]
    CreateFailed {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying failure
        reason: String,
    },
}

/// Format conversion errors
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The converter ran but did not produce the requested output
    #[error("converting {source_path} to {format} failed: {reason}")]
    Failed {
        /// The source payload
        source_path: PathBuf,
        /// The requested target format
        format: TargetFormat,
        /// The reason conversion failed
        reason: String,
    },

    /// No external conversion tool could be located
    #[error("conversion tool '{tool}' not found")]
    ToolNotFound {
        /// Name of the tool that was searched for
        tool: String,
    },
}

/// Archive packaging errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Writing the archive failed
    #[error("failed to write archive {archive}: {reason}")]
    WriteFailed {
        /// The archive being written
        archive: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// An entry name is absolute or escapes the archive root
    #[error("invalid archive entry name '{name}'")]
    InvalidEntryName {
        /// The rejected entry name
        name: String,
    },

    /// Moving a file into its bin directory failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    MoveFailed {
        /// The file being moved
        source_path: PathBuf,
        /// The bin directory destination
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },
}

impl Error {
    /// Text shown to the chat user when a job ends with this error.
    ///
    /// Internal detail (paths, tool output) stays in the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Cancelled => "Current download stopped.",
            Error::ShuttingDown => "The bot is shutting down, please try again later.",
            Error::NothingConverted { .. } => "None of the stickers in this set could be converted.",
            _ => "An error occurred while downloading the sticker(s).",
        }
    }
}
