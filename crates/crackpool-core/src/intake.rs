//! Pending hash queue
//!
//! Submitted hashes wait here, first in first out, until the scheduler is idle
//! and starts a round for the head of the queue. The queue never sees the
//! active round; the scheduler passes the in-round task to [`HashQueue::submit`]
//! so conflicts with it can be rejected.

use std::collections::VecDeque;

use crate::errors::IntakeError;
use crate::hash::HashTask;
use crate::types::{ConnectionId, Timestamp};

/// FIFO of validated hash tasks
#[derive(Debug, Default)]
pub struct HashQueue {
    pending: VecDeque<HashTask>,
}

impl HashQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a submission and append it to the queue.
    ///
    /// Checks run in this order: conflict with the in-round hash, duplicate
    /// hash, duplicate submitter, unsupported algorithm, malformed hash. The
    /// duplicate checks consider queued entries and the in-round task alike.
    pub fn submit(
        &mut self,
        algorithm: &str,
        hash: &str,
        submitter_id: ConnectionId,
        submitted_at: Timestamp,
        in_round: Option<&HashTask>,
    ) -> Result<HashTask, IntakeError> {
        if let Some(active) = in_round {
            if active.hash == hash {
                return Err(IntakeError::RoundConflict {
                    hash: hash.to_string(),
                });
            }
        }

        for existing in self.pending.iter().chain(in_round) {
            if existing.hash == hash {
                return Err(IntakeError::DuplicateHash {
                    submitted_at: existing.created_at.to_string(),
                });
            }
            if existing.submitter_id == submitter_id {
                return Err(IntakeError::DuplicateSubmitter {
                    hash: existing.hash.clone(),
                    submitted_at: existing.created_at.to_string(),
                });
            }
        }

        let task = HashTask::validated(algorithm, hash, submitter_id, submitted_at)?;
        self.pending.push_back(task.clone());
        Ok(task)
    }

    /// Drop every queued entry from `submitter_id`, returning how many went.
    pub fn remove_by_submitter(&mut self, submitter_id: &ConnectionId) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|task| &task.submitter_id != submitter_id);
        before - self.pending.len()
    }

    pub fn pop_front(&mut self) -> Option<HashTask> {
        self.pending.pop_front()
    }

    pub fn peek(&self) -> Option<&HashTask> {
        self.pending.front()
    }

    /// Zero-based queue position of a submitter's hash
    pub fn position_of(&self, submitter_id: &ConnectionId) -> Option<usize> {
        self.pending
            .iter()
            .position(|task| &task.submitter_id == submitter_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HashTask> {
        self.pending.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;

    const MD5_A: &str = "a4d80eac9ab26a4a2da04125bc2c096a";
    const MD5_B: &str = "5f4dcc3b5aa765d61d8327deb882cf99";
    const MD5_C: &str = "e10adc3949ba59abbe56e057f20f883e";

    fn submit(
        queue: &mut HashQueue,
        hash: &str,
        submitter: ConnectionId,
        in_round: Option<&HashTask>,
    ) -> Result<(), IntakeError> {
        queue
            .submit("md5", hash, submitter, Timestamp::new(0), in_round)
            .map(|_| ())
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = HashQueue::new();
        let (first, second) = (ConnectionId::new(), ConnectionId::new());
        let queued = queue
            .submit("md5", MD5_A, first, Timestamp::new(7), None)
            .unwrap();
        assert_eq!(queued.algorithm, HashAlgorithm::Md5);
        assert_eq!(queued.hash, MD5_A);
        assert_eq!(queued.created_at, Timestamp::new(7));
        submit(&mut queue, MD5_B, second, None).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.position_of(&second), Some(1));
        assert_eq!(queue.pop_front().unwrap().submitter_id, first);
        assert_eq!(queue.pop_front().unwrap().submitter_id, second);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let mut queue = HashQueue::new();
        submit(&mut queue, MD5_A, ConnectionId::new(), None).unwrap();
        let err = submit(&mut queue, MD5_A, ConnectionId::new(), None).unwrap_err();
        assert!(matches!(err, IntakeError::DuplicateHash { .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_duplicate_submitter_rejected_while_queued_or_in_round() {
        let mut queue = HashQueue::new();
        let submitter = ConnectionId::new();
        submit(&mut queue, MD5_A, submitter, None).unwrap();
        let err = submit(&mut queue, MD5_B, submitter, None).unwrap_err();
        assert_eq!(
            err,
            IntakeError::DuplicateSubmitter {
                hash: MD5_A.to_string(),
                submitted_at: Timestamp::new(0).to_string(),
            }
        );

        // once the hash is in a round the submitter is still blocked
        let active = queue.pop_front().unwrap();
        let err = submit(&mut queue, MD5_B, submitter, Some(&active)).unwrap_err();
        assert!(matches!(err, IntakeError::DuplicateSubmitter { .. }));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_round_conflict_checked_first() {
        let mut queue = HashQueue::new();
        let active = HashTask {
            algorithm: HashAlgorithm::Md5,
            hash: MD5_A.to_string(),
            submitter_id: ConnectionId::new(),
            created_at: Timestamp::new(0),
        };
        // same submitter and same hash: the conflict wins
        let err = submit(&mut queue, MD5_A, active.submitter_id, Some(&active)).unwrap_err();
        assert!(matches!(err, IntakeError::RoundConflict { .. }));

        submit(&mut queue, MD5_C, ConnectionId::new(), Some(&active)).unwrap();
    }

    #[test]
    fn test_format_errors_after_duplicate_checks() {
        let mut queue = HashQueue::new();
        let submitter = ConnectionId::new();

        let err = queue
            .submit("sha1", MD5_A, submitter, Timestamp::new(0), None)
            .unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedAlgorithm { .. }));

        let err = queue
            .submit("sha512", MD5_A, submitter, Timestamp::new(0), None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Hash is not valid. Must match sha512 pattern: {}",
                HashAlgorithm::Sha512.pattern()
            )
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_by_submitter() {
        let mut queue = HashQueue::new();
        let (leaving, staying) = (ConnectionId::new(), ConnectionId::new());
        submit(&mut queue, MD5_A, leaving, None).unwrap();
        submit(&mut queue, MD5_B, staying, None).unwrap();

        assert_eq!(queue.remove_by_submitter(&leaving), 1);
        assert_eq!(queue.remove_by_submitter(&leaving), 0);
        assert_eq!(queue.peek().unwrap().submitter_id, staying);
    }
}
