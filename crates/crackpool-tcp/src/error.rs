//! Error types for the TCP transport

use crackpool_core::{CrackpoolError, TransportError};
use thiserror::Error;

/// Errors specific to the TCP transport
#[derive(Error, Debug)]
pub enum TcpTransportError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TCP configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Frame too long: {len} bytes (max: {max_len})")]
    FrameTooLong { len: usize, max_len: usize },
}

impl From<TcpTransportError> for CrackpoolError {
    fn from(err: TcpTransportError) -> Self {
        match err {
            TcpTransportError::Bind { source, .. } => {
                CrackpoolError::Transport(TransportError::NetworkIo(source))
            }
            TcpTransportError::InvalidConfiguration { reason } => {
                CrackpoolError::config_error(reason)
            }
            other => CrackpoolError::malformed_frame(other.to_string()),
        }
    }
}
