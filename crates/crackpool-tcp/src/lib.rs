//! Crackpool TCP Transport
//!
//! Workers connect over TCP and exchange newline-delimited JSON frames with
//! the scheduler: [`WorkerFrame`](crackpool_core::WorkerFrame)s in,
//! [`ServerEvent`](crackpool_core::ServerEvent)s out. Each connection gets a
//! reader task and a writer task so a slow worker never stalls the others.

pub mod config;
pub mod error;
pub mod framing;
pub mod transport;

pub use config::TcpConfig;
pub use error::TcpTransportError;
pub use framing::{decode_frame, encode_frame, FrameReader};
pub use transport::TcpTransportTask;
