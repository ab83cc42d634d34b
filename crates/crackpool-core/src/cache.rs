//! Job cache repository
//!
//! Jobs are cached under their content hash so a later round that builds the
//! same bruteforce partition can reuse the already computed range end. The
//! cache is advisory: a miss or a failing store never stops the scheduler.

use hashbrown::HashMap;
use std::sync::RwLock;

use crate::errors::{CrackpoolError, CrackpoolResult};
use crate::job::Job;

/// Key namespace shared by every job entry
pub const CACHE_KEY_PREFIX: &str = "cracking:";

pub fn cache_key(job_hash: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, job_hash)
}

/// Store of jobs keyed by job hash
pub trait CacheRepository: Send + Sync {
    /// Store a job under its job hash, replacing any previous entry
    fn set(&self, job: &Job) -> CrackpoolResult<()>;

    /// Look a job up by job hash; `Ok(None)` is a miss
    fn get(&self, job_hash: &str) -> CrackpoolResult<Option<Job>>;

    /// Drop every cached job
    fn clear_all(&self) -> CrackpoolResult<()>;
}

/// Process-local cache holding serialized jobs
#[derive(Debug, Default)]
pub struct InMemoryCacheRepository {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryCacheRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> CrackpoolError {
    CrackpoolError::channel_error("cache lock poisoned")
}

impl CacheRepository for InMemoryCacheRepository {
    fn set(&self, job: &Job) -> CrackpoolResult<()> {
        let encoded = serde_json::to_string(job)?;
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(cache_key(job.job_hash()), encoded);
        Ok(())
    }

    fn get(&self, job_hash: &str) -> CrackpoolResult<Option<Job>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        entries
            .get(&cache_key(job_hash))
            .map(|encoded| serde_json::from_str(encoded).map_err(CrackpoolError::from))
            .transpose()
    }

    fn clear_all(&self) -> CrackpoolResult<()> {
        self.entries.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashAlgorithm, HashTask};
    use crate::job::{BruteforceJob, JobInformation};
    use crate::types::{ConnectionId, Timestamp};

    fn job(start: &[u8]) -> Job {
        let task = HashTask {
            algorithm: HashAlgorithm::Md5,
            hash: "a4d80eac9ab26a4a2da04125bc2c096a".to_string(),
            submitter_id: ConnectionId::new(),
            created_at: Timestamp::new(0),
        };
        Job::new(
            task,
            JobInformation::Bruteforce(BruteforceJob::create(start.to_vec(), 100)),
            Timestamp::new(0),
        )
    }

    #[test]
    fn test_set_get_clear() {
        let cache = InMemoryCacheRepository::new();
        let stored = job(b"ab");
        assert!(cache.get(stored.job_hash()).unwrap().is_none());

        cache.set(&stored).unwrap();
        assert_eq!(cache.get(stored.job_hash()).unwrap(), Some(stored.clone()));
        assert_eq!(cache.len(), 1);

        // same content, same key
        cache.set(&job(b"ab")).unwrap();
        assert_eq!(cache.len(), 1);

        cache.clear_all().unwrap();
        assert!(cache.is_empty());
        assert!(cache.get(stored.job_hash()).unwrap().is_none());
    }

    #[test]
    fn test_cache_key_namespace() {
        assert_eq!(cache_key("abc"), "cracking:abc");
    }
}
