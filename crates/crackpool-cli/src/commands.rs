//! Command handlers for the crackpool CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crackpool_core::{
    split_wordlist, AppEvent, DirectoryCorpus, InMemoryCorpus, LogLevel, WordlistCorpus,
};
use crackpool_runtime::{RuntimeBuilder, RuntimeHandle};
use crackpool_tcp::TcpTransportTask;

use crate::cli::{Cli, Commands};
use crate::client::WorkerClient;
use crate::config::AppConfig;
use crate::error::Result;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, mut config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Serve { listen, wordlists } => {
                if let Some(listen) = listen {
                    config.server.tcp.listen_addr = listen;
                }
                if wordlists.is_some() {
                    config.server.wordlist_dir = wordlists;
                }
                Self::handle_serve_command(config, cli.verbose).await
            }
            Commands::Worker { server, wordlists } => {
                if let Some(server) = server {
                    config.worker.server_addr = server;
                }
                if wordlists.is_some() {
                    config.worker.wordlist_dir = wordlists;
                }
                Self::handle_worker_command(config).await
            }
            Commands::Submit {
                algorithm,
                hash,
                server,
            } => {
                if let Some(server) = server {
                    config.worker.server_addr = server;
                }
                Self::handle_submit_command(config, &algorithm, &hash).await
            }
            Commands::SplitWordlist {
                input,
                chunk_size,
                out_dir,
            } => Self::handle_split_command(&input, chunk_size, &out_dir),
            Commands::ExampleConfig => {
                println!("{}", AppConfig::example_config());
                Ok(())
            }
        }
    }

    /// Run the scheduler until Ctrl+C
    async fn handle_serve_command(config: AppConfig, verbose: bool) -> Result<()> {
        config.validate()?;
        let transport = TcpTransportTask::bind(config.server.tcp.clone()).await?;
        if let Some(addr) = transport.local_addr() {
            info!("Scheduler listening on {}", addr);
        }

        let mut builder = RuntimeBuilder::new()
            .with_config(config.core.clone())
            .with_corpus(corpus_for(config.server.wordlist_dir.as_deref()))
            .add_transport(Box::new(transport));
        if verbose {
            builder = builder.with_console_logging(LogLevel::Debug);
        }
        let mut runtime = builder.build_and_start().await?;
        Self::watch_scheduler(&mut runtime).await;

        info!("Shutting down scheduler");
        runtime.shutdown().await?;
        Ok(())
    }

    /// Trace scheduler app events until Ctrl+C or until the scheduler stops
    async fn watch_scheduler(runtime: &mut RuntimeHandle) {
        let Some(mut app_events) = runtime.take_app_event_receiver() else {
            return;
        };
        loop {
            tokio::select! {
                event = app_events.recv() => match event {
                    Some(event) => log_app_event(&event),
                    None => {
                        warn!("Scheduler stopped");
                        return;
                    }
                },
                _ = tokio::signal::ctrl_c() => return,
            }
        }
    }

    async fn handle_worker_command(config: AppConfig) -> Result<()> {
        let corpus = corpus_for(config.worker.wordlist_dir.as_deref());
        let client = WorkerClient::connect(&config.worker.server_addr, corpus).await?;
        client
            .run(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
    }

    async fn handle_submit_command(config: AppConfig, algorithm: &str, hash: &str) -> Result<()> {
        let corpus = corpus_for(config.worker.wordlist_dir.as_deref());
        let client = WorkerClient::connect(&config.worker.server_addr, corpus).await?;
        let report = client.submit(algorithm, hash).await?;
        println!("{}", report);
        Ok(())
    }

    fn handle_split_command(input: &Path, chunk_size: usize, out_dir: &Path) -> Result<()> {
        let shards = split_wordlist(input, chunk_size, out_dir)?;
        let location = shards
            .first()
            .and_then(|path| path.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(out_dir));
        println!("Wrote {} shards to {}", shards.len(), location.display());
        Ok(())
    }
}

fn corpus_for(wordlist_dir: Option<&Path>) -> Arc<dyn WordlistCorpus> {
    match wordlist_dir {
        Some(dir) => Arc::new(DirectoryCorpus::new(dir)),
        None => Arc::new(InMemoryCorpus::new()),
    }
}

fn log_app_event(event: &AppEvent) {
    match event {
        AppEvent::WorkerJoined { connection_id } => debug!(worker = %connection_id, "Worker joined"),
        AppEvent::WorkerLeft {
            connection_id,
            reason,
        } => debug!(worker = %connection_id, "Worker left: {}", reason),
        AppEvent::HashQueued {
            algorithm,
            hash,
            position,
            ..
        } => debug!(%algorithm, %hash, position, "Hash queued"),
        AppEvent::RoundStarted {
            round,
            algorithm,
            hash,
            jobs,
        } => debug!(round, %algorithm, %hash, jobs, "Round started"),
        AppEvent::RoundSolved {
            round,
            hash,
            solution,
            solved_by,
        } => debug!(round, %hash, worker = %solved_by, "Round solved: {}", solution),
        AppEvent::RoundExhausted { round, hash } => debug!(round, %hash, "Round exhausted"),
        AppEvent::RoundDiscarded { round, hash } => {
            debug!(round, %hash, "Round discarded, submitter left")
        }
        AppEvent::JobsReclaimed { round, count } => debug!(round, count, "Reclaimed timed out jobs"),
        AppEvent::StatusReport {
            workers,
            queued,
            uptime_seconds,
            ..
        } => debug!(workers, queued, uptime_seconds, "Status"),
        AppEvent::SystemError { error } => warn!("Scheduler error: {}", error),
    }
}
