use thiserror::Error;

/// Crate-wide error type. Each variant group corresponds to one of the error
/// kinds in the error-handling design: configuration, I/O, integrity,
/// decompression, preprocess (never surfaced — preprocess failures are
/// silent fallbacks, not errors), compression "failure" (also never
/// surfaced, it is a framing choice not an error).
#[derive(Error, Debug)]
pub enum PcError {
    #[error("bad usage: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk {chunk_id}: integrity check failed ({reason})")]
    Integrity { chunk_id: u64, reason: String },

    #[error("archive header verification failed")]
    HeaderVerification,

    #[error("chunk {chunk_id}: decompression failed ({reason})")]
    Decompression { chunk_id: u64, reason: String },

    #[error("unsupported algorithm identifier: {0}")]
    UnsupportedAlgorithm(String),

    #[error("archive format error: {0}")]
    Format(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl PcError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        PcError::Io { path: path.into(), source }
    }

    pub fn integrity(chunk_id: u64, reason: impl Into<String>) -> Self {
        PcError::Integrity { chunk_id, reason: reason.into() }
    }

    pub fn decompression(chunk_id: u64, reason: impl Into<String>) -> Self {
        PcError::Decompression { chunk_id, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, PcError>;
