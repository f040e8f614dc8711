use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BsError {
    #[error("{0}")]
    #[diagnostic(help("select exactly one of --sample (-s) or --project (-p)"))]
    Usage(String),

    #[error("missing app token")]
    #[diagnostic(help(
        "obtain an Application Token from Illumina and pass it with -t or BASESPACE_APP_TOKEN"
    ))]
    MissingToken,

    #[error("invalid {kind} id: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    #[error("BaseSpace request failed: {0}")]
    Fetch(String),

    #[error("BaseSpace returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response for {context}: {message}")]
    Decode { context: String, message: String },

    #[error("listing stalled at offset {offset} of {total}: server returned an empty page")]
    PaginationStalled { offset: u64, total: u64 },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("refusing to write remote file name {0:?}")]
    UnsafeFileName(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("download cancelled")]
    Cancelled,
}

/// Coarse error classes used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Fetch,
    Decode,
    Io,
    Cancelled,
}

impl BsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BsError::Usage(_)
            | BsError::MissingToken
            | BsError::InvalidId { .. }
            | BsError::ConfigRead(_)
            | BsError::ConfigParse(_) => ErrorKind::Usage,
            BsError::Fetch(_) | BsError::Status { .. } => ErrorKind::Fetch,
            BsError::Decode { .. } | BsError::PaginationStalled { .. } => ErrorKind::Decode,
            BsError::Filesystem(_) | BsError::UnsafeFileName(_) => ErrorKind::Io,
            BsError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn decode(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        BsError::Decode {
            context: context.into(),
            message: err.to_string(),
        }
    }
}
