//! Worker-side job fulfilment
//!
//! A worker receives a [`Job`], searches it locally and reports back with a
//! `SolveHash` message: the matching candidate, or an empty payload when the
//! job holds no match.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::corpus::WordlistCorpus;
use crate::counter;
use crate::errors::CorpusError;
use crate::hash::HashAlgorithm;
use crate::job::{BruteforceJob, Job, JobInformation, WordlistJob};
use crate::message::{self, MessageType};

/// Outcome of searching one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub algorithm: HashAlgorithm,
    /// Matching candidate, empty when the job held none
    pub solution: String,
}

impl JobResult {
    pub fn found(&self) -> bool {
        !self.solution.is_empty()
    }

    /// Wire form of the result
    pub fn to_message(&self) -> String {
        message::encode(MessageType::SolveHash, self.algorithm.as_str(), &self.solution)
    }
}

/// Search a job of either kind
pub fn fulfill_job(job: &Job, corpus: &dyn WordlistCorpus) -> Result<JobResult, CorpusError> {
    match &job.job_information {
        JobInformation::Bruteforce(range) => Ok(fulfill_bruteforce_job(job, range)),
        JobInformation::Wordlist(shard) => fulfill_wordlist_job(job, shard, corpus),
    }
}

/// Candidates hashed between checks of the cancellation flag
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Hash `iterations` candidates starting at `range.start`, stepping with
/// [`counter::increment_in_place`].
pub fn fulfill_bruteforce_job(job: &Job, range: &BruteforceJob) -> JobResult {
    let never = AtomicBool::new(false);
    fulfill_bruteforce_job_until(job, range, &never).unwrap_or_else(|| JobResult {
        algorithm: job.hash_task.algorithm,
        solution: String::new(),
    })
}

/// Like [`fulfill_bruteforce_job`], but gives up with `None` once `cancelled`
/// is set.
pub fn fulfill_bruteforce_job_until(
    job: &Job,
    range: &BruteforceJob,
    cancelled: &AtomicBool,
) -> Option<JobResult> {
    let task = &job.hash_task;
    let mut candidate = range.start.clone();

    for step in 0..range.iterations {
        if step % CANCEL_CHECK_INTERVAL == 0 && cancelled.load(Ordering::Relaxed) {
            return None;
        }
        if task.algorithm.matches(&candidate, &task.hash) {
            return Some(JobResult {
                algorithm: task.algorithm,
                solution: counter::to_text(&candidate),
            });
        }
        counter::increment_in_place(&mut candidate);
    }

    Some(JobResult {
        algorithm: task.algorithm,
        solution: String::new(),
    })
}

/// Hash every word of one wordlist shard
pub fn fulfill_wordlist_job(
    job: &Job,
    shard: &WordlistJob,
    corpus: &dyn WordlistCorpus,
) -> Result<JobResult, CorpusError> {
    let task = &job.hash_task;
    let words = corpus.shard(&shard.wordlist_name, shard.shard_index)?;
    let solution = words
        .into_iter()
        .find(|word| task.is_solved_by(word))
        .unwrap_or_default();

    Ok(JobResult {
        algorithm: task.algorithm,
        solution,
    })
}
