//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and accept worker connections
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(short, long)]
        listen: Option<String>,
        /// Directory of wordlist shards (overrides the config file)
        #[arg(short, long)]
        wordlists: Option<PathBuf>,
    },
    /// Connect to a scheduler and work on jobs until stopped
    Worker {
        /// Scheduler address (overrides the config file)
        #[arg(short, long)]
        server: Option<String>,
        /// Directory of wordlist shards (overrides the config file)
        #[arg(short, long)]
        wordlists: Option<PathBuf>,
    },
    /// Submit a hash, help crack it and print the outcome
    Submit {
        /// Digest algorithm: md5, sha256 or sha512
        #[arg(short, long, default_value = "md5")]
        algorithm: String,
        /// Lowercase hex digest
        #[arg(long)]
        hash: String,
        /// Scheduler address (overrides the config file)
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Split a wordlist file into shards a scheduler can serve
    SplitWordlist {
        /// Wordlist file, one candidate per line
        input: PathBuf,
        /// Words per shard
        #[arg(long, default_value_t = 1000)]
        chunk_size: usize,
        /// Corpus directory to write shards into
        #[arg(short, long, default_value = "wordlists")]
        out_dir: PathBuf,
    },
    /// Print an example configuration file
    ExampleConfig,
}
