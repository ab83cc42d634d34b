//! A cracking round and the jobs that partition its search space
//!
//! A round is built for one hash: one wordlist job per corpus shard followed by
//! a chain of fixed-size bruteforce ranges starting at the empty candidate.
//! Jobs live in a `Vec` in creation order and are mutated in place; creation
//! order is also the assignment order, except that a job taken back from a
//! worker goes to a different worker when one is idle.

use core::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::CacheRepository;
use crate::corpus::WordlistCorpus;
use crate::errors::RoundError;
use crate::hash::HashTask;
use crate::job::{BruteforceJob, Job, JobId, JobInformation, WordlistJob};
use crate::types::{ConnectionId, Timestamp};

/// Shape of the bruteforce partition of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    pub bruteforce_job_count: usize,
    pub bruteforce_job_iterations: u64,
}

/// Point-in-time job counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundProgress {
    pub total: usize,
    pub done: usize,
    pub assigned: usize,
}

/// The active cracking round
#[derive(Debug, Clone)]
pub struct Round {
    number: u64,
    hash_task: HashTask,
    jobs: Vec<Job>,
    solution: Option<String>,
    solved_at: Option<Timestamp>,
    solved_by: Option<ConnectionId>,
}

impl Round {
    /// Partition the search space for `hash_task`.
    ///
    /// Corpus and cache failures are logged and skipped: a round without
    /// wordlist jobs or without cached ranges is still a valid round.
    pub fn build(
        number: u64,
        hash_task: HashTask,
        plan: RoundPlan,
        corpus: &dyn WordlistCorpus,
        cache: &dyn CacheRepository,
        now: Timestamp,
    ) -> Self {
        let mut jobs = Vec::with_capacity(plan.bruteforce_job_count);

        match corpus.wordlists() {
            Ok(wordlists) => {
                for (name, shards) in wordlists {
                    for index in 0..shards {
                        let information = JobInformation::Wordlist(WordlistJob::create(&name, index));
                        jobs.push(Job::new(hash_task.clone(), information, now));
                    }
                }
            }
            Err(e) => warn!(round = number, "Could not list wordlists: {}", e),
        }

        let mut cursor: Vec<u8> = Vec::new();
        let mut reused = 0usize;
        for _ in 0..plan.bruteforce_job_count {
            let range = match cached_range(cache, &cursor, plan.bruteforce_job_iterations) {
                Some(range) => {
                    reused += 1;
                    range
                }
                None => BruteforceJob::create(cursor.clone(), plan.bruteforce_job_iterations),
            };
            cursor = range.next.clone();

            let job = Job::new(hash_task.clone(), JobInformation::Bruteforce(range), now);
            if let Err(e) = cache.set(&job) {
                warn!(round = number, job_hash = job.job_hash(), "Could not cache job: {}", e);
            }
            jobs.push(job);
        }

        debug!(
            round = number,
            jobs = jobs.len(),
            cached_ranges = reused,
            "Built round"
        );

        Self {
            number,
            hash_task,
            jobs,
            solution: None,
            solved_at: None,
            solved_by: None,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn hash_task(&self) -> &HashTask {
        &self.hash_task
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn solution(&self) -> Option<&str> {
        self.solution.as_deref()
    }

    pub fn solved_at(&self) -> Option<Timestamp> {
        self.solved_at
    }

    pub fn solved_by(&self) -> Option<ConnectionId> {
        self.solved_by
    }

    pub fn is_solved(&self) -> bool {
        self.solution.is_some()
    }

    pub fn all_done(&self) -> bool {
        self.jobs.iter().all(Job::is_done)
    }

    /// Every job finished without anyone finding the solution
    pub fn is_exhausted(&self) -> bool {
        !self.is_solved() && self.all_done()
    }

    pub fn progress(&self) -> RoundProgress {
        RoundProgress {
            total: self.jobs.len(),
            done: self.jobs.iter().filter(|job| job.is_done()).count(),
            assigned: self.jobs.iter().filter(|job| job.is_assigned()).count(),
        }
    }

    /// Job currently held by `worker`
    pub fn job_of(&self, worker: &ConnectionId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.is_assigned_to(worker))
    }

    pub fn has_job(&self, worker: &ConnectionId) -> bool {
        self.job_of(worker).is_some()
    }

    /// Give `worker` the first available job in creation order, skipping
    /// jobs that were taken back from `worker` itself
    pub fn assign_next(
        &mut self,
        worker: ConnectionId,
        now: Timestamp,
        timeout: Duration,
    ) -> Option<&Job> {
        let job = self
            .jobs
            .iter_mut()
            .find(|job| job.is_available() && job.previous_solver_id != Some(worker))?;
        job.assign(worker, now, timeout);
        Some(job)
    }

    /// Give `worker` the first available job in creation order, including
    /// one it previously held
    pub fn retry_next(
        &mut self,
        worker: ConnectionId,
        now: Timestamp,
        timeout: Duration,
    ) -> Option<&Job> {
        let job = self.jobs.iter_mut().find(|job| job.is_available())?;
        job.assign(worker, now, timeout);
        Some(job)
    }

    /// Return every job whose deadline has passed to the pool
    pub fn reclaim_timed_out(&mut self, now: Timestamp) -> Vec<(JobId, ConnectionId)> {
        let mut reclaimed = Vec::new();
        for job in self.jobs.iter_mut().filter(|job| job.is_timed_out(now)) {
            if let Some(worker) = job.solver_id {
                reclaimed.push((job.id, worker));
            }
            job.unassign();
        }
        reclaimed
    }

    /// Return `worker`'s job to the pool without marking it done
    pub fn release_worker(&mut self, worker: &ConnectionId) -> Option<JobId> {
        let job = self.jobs.iter_mut().find(|job| job.is_assigned_to(worker))?;
        job.unassign();
        Some(job.id)
    }

    /// Mark `worker`'s job done
    pub fn complete_job_of(&mut self, worker: &ConnectionId, now: Timestamp) -> Option<JobId> {
        let job = self.jobs.iter_mut().find(|job| job.is_assigned_to(worker))?;
        job.mark_done(now);
        Some(job.id)
    }

    /// Verify and record a reported solution.
    ///
    /// A correct solution also marks the solver's job done. A wrong one leaves
    /// the round untouched.
    pub fn record_solution(
        &mut self,
        solution: &str,
        solver: ConnectionId,
        now: Timestamp,
    ) -> Result<(), RoundError> {
        if !self.hash_task.is_solved_by(solution) {
            return Err(RoundError::IncorrectSolution {
                solution: solution.to_string(),
            });
        }
        self.solution = Some(solution.to_string());
        self.solved_at = Some(now);
        self.solved_by = Some(solver);
        self.complete_job_of(&solver, now);
        Ok(())
    }
}

/// Reuse a cached range end when the cache holds a job for exactly this range
fn cached_range(
    cache: &dyn CacheRepository,
    start: &[u8],
    iterations: u64,
) -> Option<BruteforceJob> {
    let job_hash = BruteforceJob::hash_for(start, iterations);
    match cache.get(&job_hash) {
        Ok(Some(Job {
            job_information: JobInformation::Bruteforce(cached),
            ..
        })) if cached.start == start && cached.iterations == iterations => {
            Some(BruteforceJob::with_next(start.to_vec(), cached.next, iterations))
        }
        Ok(_) => None,
        Err(e) => {
            warn!(job_hash = %job_hash, "Cache lookup failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheRepository;
    use crate::corpus::InMemoryCorpus;
    use crate::counter;
    use crate::hash::HashAlgorithm;

    const TIMEOUT: Duration = Duration::from_secs(60);

    fn task() -> HashTask {
        HashTask {
            algorithm: HashAlgorithm::Md5,
            hash: "a4d80eac9ab26a4a2da04125bc2c096a".to_string(),
            submitter_id: ConnectionId::new(),
            created_at: Timestamp::new(0),
        }
    }

    fn plan(count: usize, iterations: u64) -> RoundPlan {
        RoundPlan {
            bruteforce_job_count: count,
            bruteforce_job_iterations: iterations,
        }
    }

    fn build(corpus: &InMemoryCorpus, count: usize, iterations: u64) -> Round {
        Round::build(
            1,
            task(),
            plan(count, iterations),
            corpus,
            &InMemoryCacheRepository::new(),
            Timestamp::new(0),
        )
    }

    #[test]
    fn test_build_wordlists_then_chained_ranges() {
        let corpus = InMemoryCorpus::new().with_wordlist("tiny", ["a", "b", "c"], 2);
        let round = build(&corpus, 4, 100);

        assert_eq!(round.jobs().len(), 2 + 4);
        assert!(matches!(
            &round.jobs()[1].job_information,
            JobInformation::Wordlist(WordlistJob { shard_index: 1, .. })
        ));

        let ranges: Vec<&BruteforceJob> = round
            .jobs()
            .iter()
            .filter_map(|job| match &job.job_information {
                JobInformation::Bruteforce(range) => Some(range),
                _ => None,
            })
            .collect();
        assert!(ranges[0].start.is_empty());
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].next, pair[1].start);
        }
        assert_eq!(ranges[3].next, counter::advance(&[], 400));
    }

    #[test]
    fn test_build_reuses_cached_ranges() {
        let corpus = InMemoryCorpus::new();
        let cache = InMemoryCacheRepository::new();
        let first = Round::build(1, task(), plan(3, 50), &corpus, &cache, Timestamp::new(0));
        assert_eq!(cache.len(), 3);

        let second = Round::build(2, task(), plan(3, 50), &corpus, &cache, Timestamp::new(5));
        let hashes = |round: &Round| -> Vec<String> {
            round.jobs().iter().map(|job| job.job_hash().to_string()).collect()
        };
        assert_eq!(hashes(&first), hashes(&second));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_assignment_follows_creation_order() {
        let mut round = build(&InMemoryCorpus::new(), 3, 10);
        let (a, b) = (ConnectionId::new(), ConnectionId::new());

        let first = round.assign_next(a, Timestamp::new(0), TIMEOUT).unwrap().id;
        let second = round.assign_next(b, Timestamp::new(0), TIMEOUT).unwrap().id;
        assert_eq!(first, round.jobs()[0].id);
        assert_eq!(second, round.jobs()[1].id);
        assert_eq!(round.job_of(&a).unwrap().id, first);

        assert_eq!(round.release_worker(&a), Some(first));
        assert!(!round.has_job(&a));
        let reassigned = round.assign_next(b, Timestamp::new(0), TIMEOUT).unwrap().id;
        assert_eq!(reassigned, first);
    }

    #[test]
    fn test_reclaimed_job_prefers_another_worker() {
        let mut round = build(&InMemoryCorpus::new(), 1, 10);
        let (silent, other) = (ConnectionId::new(), ConnectionId::new());
        let job = round.assign_next(silent, Timestamp::new(0), TIMEOUT).unwrap().id;
        round.reclaim_timed_out(Timestamp::new(60_001));

        assert!(round.assign_next(silent, Timestamp::new(60_001), TIMEOUT).is_none());
        assert_eq!(
            round.assign_next(other, Timestamp::new(60_001), TIMEOUT).unwrap().id,
            job
        );
    }

    #[test]
    fn test_lone_worker_can_retry_its_job() {
        let mut round = build(&InMemoryCorpus::new(), 1, 10);
        let worker = ConnectionId::new();
        let job = round.assign_next(worker, Timestamp::new(0), TIMEOUT).unwrap().id;
        round.reclaim_timed_out(Timestamp::new(60_001));

        assert!(round.assign_next(worker, Timestamp::new(60_001), TIMEOUT).is_none());
        let retried = round.retry_next(worker, Timestamp::new(60_001), TIMEOUT).unwrap();
        assert_eq!(retried.id, job);
        assert!(retried.is_assigned_to(&worker));
    }

    #[test]
    fn test_timeout_reclaim() {
        let mut round = build(&InMemoryCorpus::new(), 2, 10);
        let worker = ConnectionId::new();
        round.assign_next(worker, Timestamp::new(0), TIMEOUT);

        assert!(round.reclaim_timed_out(Timestamp::new(60_000)).is_empty());
        let reclaimed = round.reclaim_timed_out(Timestamp::new(60_001));
        assert_eq!(reclaimed, vec![(round.jobs()[0].id, worker)]);
        assert!(round.jobs()[0].is_available());
    }

    #[test]
    fn test_exhaustion() {
        let mut round = build(&InMemoryCorpus::new(), 2, 10);
        let worker = ConnectionId::new();
        for _ in 0..2 {
            round.assign_next(worker, Timestamp::new(0), TIMEOUT);
            assert!(!round.is_exhausted());
            round.complete_job_of(&worker, Timestamp::new(1));
        }
        assert!(round.all_done());
        assert!(round.is_exhausted());
        assert_eq!(
            round.progress(),
            RoundProgress {
                total: 2,
                done: 2,
                assigned: 0
            }
        );
    }

    #[test]
    fn test_record_solution() {
        let mut round = build(&InMemoryCorpus::new(), 2, 10);
        let solver = ConnectionId::new();
        round.assign_next(solver, Timestamp::new(0), TIMEOUT);

        let err = round
            .record_solution("wrong", solver, Timestamp::new(1))
            .unwrap_err();
        assert_eq!(
            err,
            RoundError::IncorrectSolution {
                solution: "wrong".to_string()
            }
        );
        assert!(!round.is_solved());
        assert!(round.has_job(&solver));

        round
            .record_solution("s3cr3t", solver, Timestamp::new(2))
            .unwrap();
        assert_eq!(round.solution(), Some("s3cr3t"));
        assert_eq!(round.solved_by(), Some(solver));
        assert!(round.jobs()[0].is_done());
        assert!(!round.is_exhausted());
    }
}
