//! Connected worker membership
//!
//! Kept apart from the round: a worker belongs here from connect until
//! disconnect, whether or not it holds a job.

use crackpool_core::{ConnectionId, Timestamp, TransportType};

/// A connected worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub connection_id: ConnectionId,
    pub transport: TransportType,
    pub joined_at: Timestamp,
}

/// Set of connected workers in join order
///
/// Join order is the order idle workers are offered jobs.
#[derive(Debug, Default)]
pub struct WorkerMembership {
    workers: Vec<WorkerRecord>,
}

impl WorkerMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker; returns `false` if it was already a member
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        transport: TransportType,
        joined_at: Timestamp,
    ) -> bool {
        if self.contains(&connection_id) {
            return false;
        }
        self.workers.push(WorkerRecord {
            connection_id,
            transport,
            joined_at,
        });
        true
    }

    /// Remove a worker, returning its record if it was a member
    pub fn leave(&mut self, connection_id: &ConnectionId) -> Option<WorkerRecord> {
        let index = self
            .workers
            .iter()
            .position(|worker| &worker.connection_id == connection_id)?;
        Some(self.workers.remove(index))
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.workers
            .iter()
            .any(|worker| &worker.connection_id == connection_id)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&WorkerRecord> {
        self.workers
            .iter()
            .find(|worker| &worker.connection_id == connection_id)
    }

    /// Member ids in join order
    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.workers.iter().map(|worker| worker.connection_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.iter()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
