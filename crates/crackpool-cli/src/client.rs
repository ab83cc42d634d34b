//! Worker client
//!
//! Connects to a scheduler over TCP, answers heartbeat probes and searches
//! the jobs it is handed. Wordlist shards are searched inline; bruteforce
//! ranges run on the blocking pool so probes keep being answered while a
//! range is hashed. A new job supersedes any range still running: that
//! search is cancelled and its result is never reported, since a result
//! carries no job id and would be credited to the new job.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crackpool_core::{
    message, worker, Job, JobInformation, JobResult, MessageType, ServerEvent, WordlistCorpus,
    WorkerFrame,
};
use crackpool_tcp::{decode_frame, encode_frame, FrameReader};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};

/// Longest frame a worker accepts from the scheduler
const MAX_SERVER_FRAME_LEN: usize = 1 << 20;

/// A bruteforce result tagged with the search it came from
type SearchResult = (u64, JobResult);

/// How a work session ends
enum Until {
    /// The scheduler closes the connection or shutdown is requested
    Closed,
    /// The submitted hash's outcome arrives
    HashComplete,
}

pub struct WorkerClient {
    frames: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    corpus: Arc<dyn WordlistCorpus>,
    jobs_completed: u64,
    /// Incremented for every job received
    generation: u64,
    /// Cancellation flag of the bruteforce range in flight
    running: Option<Arc<AtomicBool>>,
}

impl WorkerClient {
    pub async fn connect(addr: &str, corpus: Arc<dyn WordlistCorpus>) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| CliError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        let (read_half, writer) = stream.into_split();
        info!("Connected to the scheduler at {}", addr);
        Ok(Self {
            frames: FrameReader::new(read_half, MAX_SERVER_FRAME_LEN),
            writer,
            corpus,
            jobs_completed: 0,
            generation: 0,
            running: None,
        })
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed
    }

    /// Work until the scheduler hangs up or `shutdown` resolves
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) -> Result<()> {
        match self.work(Until::Closed, shutdown).await {
            Ok(_) | Err(CliError::ConnectionClosed) => {
                info!(jobs = self.jobs_completed, "Worker stopped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Submit a hash, work on rounds meanwhile and return the outcome report
    pub async fn submit(mut self, algorithm: &str, hash: &str) -> Result<String> {
        let data = message::encode(MessageType::SubmitHash, algorithm, hash);
        self.send(&WorkerFrame::Data(data)).await?;

        let report = self
            .work(Until::HashComplete, std::future::pending())
            .await?;
        self.send(&WorkerFrame::ForceDisconnect).await?;
        report.ok_or(CliError::ConnectionClosed)
    }

    async fn send(&mut self, frame: &WorkerFrame) -> Result<()> {
        let line = encode_frame(frame)?;
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn work<F: Future<Output = ()>>(
        &mut self,
        until: Until,
        shutdown: F,
    ) -> Result<Option<String>> {
        tokio::pin!(shutdown);
        let (results, mut finished) = mpsc::unbounded_channel::<SearchResult>();
        let mut awaiting_ack = matches!(until, Until::HashComplete);

        loop {
            tokio::select! {
                line = self.frames.next_line() => {
                    let Some(line) = line? else {
                        return Err(CliError::ConnectionClosed);
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let event = match decode_frame::<ServerEvent>(&line) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("Ignoring frame from scheduler: {}", e);
                            continue;
                        }
                    };

                    match event {
                        ServerEvent::Lifecheck => self.send(&WorkerFrame::Lifecheck).await?,
                        ServerEvent::Log(text) => {
                            if awaiting_ack {
                                if text.starts_with("[ERROR]") {
                                    return Err(CliError::Rejected(text));
                                }
                                awaiting_ack = false;
                            }
                            info!("{}", text);
                        }
                        ServerEvent::Job(job) | ServerEvent::PerformBruteforceJob(job) => {
                            if let Some(result) = self.start_job(job, &results) {
                                self.report(result).await?;
                            }
                        }
                        ServerEvent::HashComplete(report) => {
                            info!("{}", report);
                            if matches!(until, Until::HashComplete) {
                                return Ok(Some(report));
                            }
                        }
                    }
                }

                Some((generation, result)) = finished.recv() => {
                    if generation == self.generation {
                        self.running = None;
                        self.report(result).await?;
                    } else {
                        debug!(generation, "Dropping result of a superseded search");
                    }
                }

                _ = &mut shutdown => {
                    self.cancel_running();
                    info!("Disconnecting from the scheduler");
                    self.send(&WorkerFrame::ForceDisconnect).await?;
                    return Ok(None);
                }
            }
        }
    }

    /// Search a wordlist job now, or start a bruteforce job in the background
    fn start_job(
        &mut self,
        job: Job,
        results: &mpsc::UnboundedSender<SearchResult>,
    ) -> Option<JobResult> {
        debug!(job = %job.id, "Received job");
        self.cancel_running();
        self.generation += 1;

        if !job.job_information.is_bruteforce() {
            return match worker::fulfill_job(&job, self.corpus.as_ref()) {
                Ok(result) => Some(result),
                Err(e) => {
                    // left unreported so the scheduler reclaims it for another worker
                    warn!(job = %job.id, "Cannot search wordlist job: {}", e);
                    None
                }
            };
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        self.running = Some(cancelled.clone());
        let generation = self.generation;
        let results = results.clone();
        tokio::task::spawn_blocking(move || {
            if let JobInformation::Bruteforce(range) = &job.job_information {
                if let Some(result) = worker::fulfill_bruteforce_job_until(&job, range, &cancelled) {
                    let _ = results.send((generation, result));
                }
            }
        });
        None
    }

    fn cancel_running(&mut self) {
        if let Some(cancelled) = self.running.take() {
            debug!(generation = self.generation, "Cancelling superseded search");
            cancelled.store(true, Ordering::Relaxed);
        }
    }

    async fn report(&mut self, result: JobResult) -> Result<()> {
        self.jobs_completed += 1;
        if result.found() {
            info!("Found a solution: {}", result.solution);
        }
        self.send(&WorkerFrame::Data(result.to_message())).await
    }
}

impl Drop for WorkerClient {
    fn drop(&mut self) {
        self.cancel_running();
    }
}
