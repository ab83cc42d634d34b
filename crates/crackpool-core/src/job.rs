//! Units of work handed to workers
//!
//! A [`Job`] wraps a [`JobInformation`] (what to search) with assignment state
//! (who is searching it and until when). Job information is content-addressed:
//! its `job_hash` is derived from the variant and its parameters only, so two
//! identical partitions built in different rounds share an identity and can be
//! looked up in a [`CacheRepository`](crate::cache::CacheRepository).

use core::fmt;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::counter;
use crate::hash::HashTask;
use crate::types::{ConnectionId, Timestamp};

/// Default time a worker has to finish a job before it is reclaimed
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60);

// ----------------------------------------------------------------------------
// Job Identifier
// ----------------------------------------------------------------------------

/// Unique identifier of one job instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Job Information
// ----------------------------------------------------------------------------

/// One pre-partitioned shard of a wordlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordlistJob {
    pub wordlist_name: String,
    pub shard_index: u32,
    pub job_hash: String,
}

/// A contiguous range of the bruteforce keyspace
///
/// Covers `iterations` candidates beginning at `start`; `next` is the first
/// candidate not covered and becomes the `start` of the following range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BruteforceJob {
    pub start: Vec<u8>,
    pub next: Vec<u8>,
    pub iterations: u64,
    pub job_hash: String,
}

/// Hashed identity payloads. Field order is part of the identity.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JobIdentity<'a> {
    Wordlist {
        #[serde(rename = "wordlistName")]
        wordlist_name: &'a str,
        #[serde(rename = "shardIndex")]
        shard_index: u32,
    },
    Bruteforce {
        start: &'a [u8],
        iterations: u64,
    },
}

impl JobIdentity<'_> {
    fn digest(&self) -> String {
        // Serializing a borrowed struct of strings and integers cannot fail.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

impl WordlistJob {
    pub fn create(wordlist_name: impl Into<String>, shard_index: u32) -> Self {
        let wordlist_name = wordlist_name.into();
        let job_hash = JobIdentity::Wordlist {
            wordlist_name: &wordlist_name,
            shard_index,
        }
        .digest();
        Self {
            wordlist_name,
            shard_index,
            job_hash,
        }
    }
}

impl BruteforceJob {
    /// Build a range, computing its end with [`counter::advance`].
    pub fn create(start: Vec<u8>, iterations: u64) -> Self {
        let next = counter::advance(&start, iterations);
        Self::with_next(start, next, iterations)
    }

    /// Build a range whose end is already known (e.g. from the cache).
    pub fn with_next(start: Vec<u8>, next: Vec<u8>, iterations: u64) -> Self {
        let job_hash = Self::hash_for(&start, iterations);
        Self {
            start,
            next,
            iterations,
            job_hash,
        }
    }

    /// Identity a range with these parameters would have
    pub fn hash_for(start: &[u8], iterations: u64) -> String {
        JobIdentity::Bruteforce { start, iterations }.digest()
    }
}

/// What a job searches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobInformation {
    Wordlist(WordlistJob),
    Bruteforce(BruteforceJob),
}

impl JobInformation {
    pub fn job_hash(&self) -> &str {
        match self {
            JobInformation::Wordlist(job) => &job.job_hash,
            JobInformation::Bruteforce(job) => &job.job_hash,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobInformation::Wordlist(_) => "wordlist",
            JobInformation::Bruteforce(_) => "bruteforce",
        }
    }

    pub fn is_bruteforce(&self) -> bool {
        matches!(self, JobInformation::Bruteforce(_))
    }
}

// ----------------------------------------------------------------------------
// Job
// ----------------------------------------------------------------------------

/// A unit of work within a round, with its assignment state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub hash_task: HashTask,
    pub job_information: JobInformation,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_id: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_at: Option<Timestamp>,
    /// Worker that held the job before it was last returned to the pool
    #[serde(skip)]
    pub previous_solver_id: Option<ConnectionId>,
}

impl Job {
    pub fn new(hash_task: HashTask, job_information: JobInformation, now: Timestamp) -> Self {
        Self {
            id: JobId::new(),
            hash_task,
            job_information,
            created_at: now,
            solver_id: None,
            assigned_at: None,
            timeout_at: None,
            done_at: None,
            previous_solver_id: None,
        }
    }

    pub fn job_hash(&self) -> &str {
        self.job_information.job_hash()
    }

    pub fn is_done(&self) -> bool {
        self.done_at.is_some()
    }

    pub fn is_assigned(&self) -> bool {
        self.solver_id.is_some() && !self.is_done()
    }

    pub fn is_assigned_to(&self, solver_id: &ConnectionId) -> bool {
        self.is_assigned() && self.solver_id.as_ref() == Some(solver_id)
    }

    /// Free for assignment: neither held by a worker nor finished
    pub fn is_available(&self) -> bool {
        self.solver_id.is_none() && !self.is_done()
    }

    pub fn is_timed_out(&self, now: Timestamp) -> bool {
        !self.is_done() && self.timeout_at.is_some_and(|deadline| deadline < now)
    }

    pub fn assign(&mut self, solver_id: ConnectionId, now: Timestamp, timeout: Duration) {
        debug_assert!(!self.is_done(), "done jobs are never reassigned");
        self.solver_id = Some(solver_id);
        self.assigned_at = Some(now);
        self.timeout_at = Some(now + timeout);
    }

    pub fn unassign(&mut self) {
        if let Some(solver_id) = self.solver_id.take() {
            self.previous_solver_id = Some(solver_id);
        }
        self.assigned_at = None;
        self.timeout_at = None;
    }

    pub fn mark_done(&mut self, now: Timestamp) {
        self.done_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;

    fn task() -> HashTask {
        HashTask {
            algorithm: HashAlgorithm::Md5,
            hash: "a4d80eac9ab26a4a2da04125bc2c096a".to_string(),
            submitter_id: ConnectionId::new(),
            created_at: Timestamp::new(0),
        }
    }

    #[test]
    fn test_bruteforce_identity_is_content_derived() {
        let a = BruteforceJob::create(b"abc".to_vec(), 1_000);
        let b = BruteforceJob::create(b"abc".to_vec(), 1_000);
        assert_eq!(a.job_hash, b.job_hash);
        assert_ne!(a.job_hash, BruteforceJob::create(b"abd".to_vec(), 1_000).job_hash);
        assert_ne!(a.job_hash, BruteforceJob::create(b"abc".to_vec(), 1_001).job_hash);
        assert_eq!(a.job_hash.len(), 64);
    }

    #[test]
    fn test_variants_do_not_share_identity() {
        let wordlist = WordlistJob::create("rockyou", 0);
        let bruteforce = BruteforceJob::create(Vec::new(), 0);
        assert_ne!(wordlist.job_hash, bruteforce.job_hash);
        assert_eq!(wordlist.job_hash, WordlistJob::create("rockyou", 0).job_hash);
        assert_ne!(wordlist.job_hash, WordlistJob::create("rockyou", 1).job_hash);
    }

    #[test]
    fn test_bruteforce_ranges_chain() {
        let first = BruteforceJob::create(Vec::new(), 500);
        let second = BruteforceJob::create(first.next.clone(), 500);
        assert_eq!(second.start, first.next);
        assert_eq!(second.next, counter::advance(&[], 1_000));
    }

    #[test]
    fn test_assignment_lifecycle() {
        let mut job = Job::new(
            task(),
            JobInformation::Wordlist(WordlistJob::create("rockyou", 3)),
            Timestamp::new(0),
        );
        let worker = ConnectionId::new();
        assert!(job.is_available());

        job.assign(worker, Timestamp::new(1_000), DEFAULT_JOB_TIMEOUT);
        assert!(job.is_assigned());
        assert!(job.is_assigned_to(&worker));
        assert_eq!(job.timeout_at, Some(Timestamp::new(61_000)));
        assert!(!job.is_timed_out(Timestamp::new(61_000)));
        assert!(job.is_timed_out(Timestamp::new(61_001)));

        job.unassign();
        assert!(job.is_available());
        assert_eq!(job.previous_solver_id, Some(worker));
        assert!(!job.is_timed_out(Timestamp::new(100_000)));

        job.assign(worker, Timestamp::new(2_000), DEFAULT_JOB_TIMEOUT);
        job.mark_done(Timestamp::new(3_000));
        assert!(job.is_done());
        assert!(!job.is_assigned());
        assert!(!job.is_available());
        assert!(!job.is_timed_out(Timestamp::new(1_000_000)));
    }

    #[test]
    fn test_job_serializes_variant_tag() {
        let job = Job::new(
            task(),
            JobInformation::Bruteforce(BruteforceJob::create(b"s3cr1t".to_vec(), 10)),
            Timestamp::new(0),
        );
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["jobInformation"]["type"], "bruteforce");
        assert_eq!(json["jobInformation"]["iterations"], 10);
        assert_eq!(json["hashTask"]["algorithm"], "md5");

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }
}
