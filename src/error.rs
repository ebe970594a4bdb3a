use thiserror::Error;

use crate::config::connection::EngineType;

/// Errors raised by the dump/restore/transfer core.
#[derive(Error, Debug)]
pub enum DbearError {
    /// Engine tag outside postgresql, mysql, sqlite
    #[error("unsupported database type: {0}")]
    UnsupportedEngine(String),

    /// Profile fields that cannot form a usable address
    #[error("invalid connection '{name}': {reason}")]
    InvalidConnection { name: String, reason: String },

    #[error("failed to connect to {engine} server at {address}: {reason}")]
    ConnectionFailed {
        engine: EngineType,
        address: String,
        reason: String,
    },

    #[error("failed to query {engine} server version: {reason}")]
    QueryFailed { engine: EngineType, reason: String },

    #[error("failed to determine docker image for {engine} version '{version}'")]
    ImageResolutionFailed { engine: EngineType, version: String },

    /// Dump tool exited non-zero or could not be launched
    #[error("{engine} dump failed: {diagnostic}")]
    DumpFailed {
        engine: EngineType,
        diagnostic: String,
    },

    /// Restore tool exited non-zero or could not be launched
    #[error("{engine} restore failed: {diagnostic}")]
    RestoreFailed {
        engine: EngineType,
        diagnostic: String,
    },

    #[error(
        "source and destination databases must be of the same type (source: {source_engine}, destination: {destination_engine})"
    )]
    EngineMismatch {
        source_engine: EngineType,
        destination_engine: EngineType,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbearError {
    pub fn dump_failed(engine: EngineType, diagnostic: impl Into<String>) -> Self {
        DbearError::DumpFailed {
            engine,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn restore_failed(engine: EngineType, diagnostic: impl Into<String>) -> Self {
        DbearError::RestoreFailed {
            engine,
            diagnostic: diagnostic.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbearError>;

/// `err` and each of its sources joined with `": "`, skipping causes the
/// outer message already spells out.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}
