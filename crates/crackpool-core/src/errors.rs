//! Error types for the crackpool scheduler
//!
//! This module contains all error types used throughout the core, grouped by the
//! component that raises them, and the `CrackpoolError` type that unifies them.
//! Everything a worker can trigger is recoverable and local to its connection;
//! only channel and configuration failures are treated as fatal by the runtime.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Hash intake rejections
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("Hash is not valid. Must match {algorithm} pattern: {pattern}")]
    InvalidHashFormat { algorithm: String, pattern: String },
    #[error("Algorithm not supported: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
    #[error("This hash is already in the queue. Submitted at {submitted_at}")]
    DuplicateHash { submitted_at: String },
    #[error("You already have a hash in the queue: {hash} created at {submitted_at}")]
    DuplicateSubmitter { hash: String, submitted_at: String },
    #[error("This hash is already being cracked: {hash}")]
    RoundConflict { hash: String },
}

/// Wire message codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid message: {reason}")]
    MalformedMessage { reason: String },
    #[error("Invalid frame: {reason}")]
    MalformedFrame { reason: String },
}

/// Errors raised while handling solve reports against the active round
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoundError {
    #[error("Solution is incorrect: {solution}")]
    IncorrectSolution { solution: String },
    #[error("No hash is being cracked at the moment")]
    NoActiveRound,
}

/// Wordlist corpus errors
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Unknown wordlist: {name}")]
    UnknownWordlist { name: String },
    #[error("Shard {index} out of range for wordlist {name} ({count} shards)")]
    ShardOutOfRange { name: String, index: u32, count: u32 },
    #[error("Wordlist I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network I/O error: {0}")]
    NetworkIo(#[from] std::io::Error),
    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: String },
    #[error("Transport channels not attached")]
    NotAttached,
    #[error("Transport shutdown: {reason}")]
    Shutdown { reason: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the crackpool scheduler
#[derive(Debug, thiserror::Error)]
pub enum CrackpoolError {
    #[error("{0}")]
    Intake(#[from] IntakeError),

    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Round(#[from] RoundError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Channel communication error (internal to CSP architecture)
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl CrackpoolError {
    /// Create a malformed message error with a reason
    pub fn malformed_message<T: Into<String>>(reason: T) -> Self {
        CrackpoolError::Protocol(ProtocolError::MalformedMessage {
            reason: reason.into(),
        })
    }

    /// Create a malformed frame error with a reason
    pub fn malformed_frame<T: Into<String>>(reason: T) -> Self {
        CrackpoolError::Protocol(ProtocolError::MalformedFrame {
            reason: reason.into(),
        })
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        CrackpoolError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        CrackpoolError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a transport shutdown error with a reason
    pub fn transport_shutdown<T: Into<String>>(reason: T) -> Self {
        CrackpoolError::Transport(TransportError::Shutdown {
            reason: reason.into(),
        })
    }

    /// Whether the scheduler can keep running after this error.
    ///
    /// Channel and configuration failures leave the scheduler without a way to
    /// talk to its peers; every other error is local to one connection.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            CrackpoolError::Channel { .. } | CrackpoolError::Configuration { .. }
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, CrackpoolError>;
pub type CrackpoolResult<T> = Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intake_errors_render_worker_facing_text() {
        let err: CrackpoolError = IntakeError::UnsupportedAlgorithm {
            algorithm: "crc32".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Algorithm not supported: crc32");
    }

    #[test]
    fn test_recoverability_classification() {
        assert!(CrackpoolError::from(RoundError::NoActiveRound).is_recoverable());
        assert!(CrackpoolError::malformed_message("too few fields").is_recoverable());
        assert!(!CrackpoolError::channel_error("closed").is_recoverable());
        assert!(!CrackpoolError::config_error("bad").is_recoverable());
    }
}
