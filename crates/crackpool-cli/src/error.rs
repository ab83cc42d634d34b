//! Error handling for the crackpool CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Scheduler error: {0}")]
    Core(#[from] crackpool_core::CrackpoolError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] crackpool_core::CorpusError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not reach scheduler at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Scheduler closed the connection")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
