//! crackpool CLI library
//!
//! Configuration, the worker client and the command handlers behind the
//! `crackpool` binary.

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands};
pub use client::WorkerClient;
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use error::{CliError, Result};
