//! Worker liveness tracking
//!
//! Every registered connection is probed once per `probe_interval`. A probe
//! left unanswered for `ack_timeout` marks the worker dead. The tracker only
//! reports: what a dead worker means for the round is the scheduler's call.

use crackpool_core::{ConnectionId, LivenessConfig, Timestamp};
use hashbrown::HashMap;

// ----------------------------------------------------------------------------
// Liveness Tracker
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Heartbeat {
    next_probe_at: Timestamp,
    ack_deadline: Option<Timestamp>,
}

/// Outcome of one [`LivenessTracker::poll`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessSweep {
    /// Connections to send a `lifecheck` probe to now
    pub probe: Vec<ConnectionId>,
    /// Connections that missed their acknowledgement, already forgotten
    pub expired: Vec<ConnectionId>,
}

impl LivenessSweep {
    pub fn is_empty(&self) -> bool {
        self.probe.is_empty() && self.expired.is_empty()
    }
}

/// Statistics for liveness tracking
#[derive(Debug, Clone, Default)]
pub struct LivenessStats {
    pub probes_sent: u64,
    pub acks_received: u64,
    /// Acks that arrived with no probe outstanding
    pub stray_acks: u64,
    pub workers_expired: u64,
}

/// Clock-driven heartbeat state per worker connection
#[derive(Debug)]
pub struct LivenessTracker {
    config: LivenessConfig,
    connections: HashMap<ConnectionId, Heartbeat>,
    stats: LivenessStats,
}

impl LivenessTracker {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            connections: HashMap::new(),
            stats: LivenessStats::default(),
        }
    }

    /// Start tracking a connection; its first probe is due one interval from `now`.
    ///
    /// Returns `false` when the connection was already tracked.
    pub fn register(&mut self, connection_id: ConnectionId, now: Timestamp) -> bool {
        if self.connections.contains_key(&connection_id) {
            return false;
        }
        self.connections.insert(
            connection_id,
            Heartbeat {
                next_probe_at: now + self.config.probe_interval,
                ack_deadline: None,
            },
        );
        true
    }

    /// Record a probe acknowledgement.
    ///
    /// Returns `false` (and changes nothing) when no probe is outstanding.
    pub fn acknowledge(&mut self, connection_id: &ConnectionId) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(heartbeat) if heartbeat.ack_deadline.is_some() => {
                heartbeat.ack_deadline = None;
                self.stats.acks_received += 1;
                true
            }
            _ => {
                self.stats.stray_acks += 1;
                false
            }
        }
    }

    /// Stop tracking a connection
    pub fn remove(&mut self, connection_id: &ConnectionId) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    /// Advance every heartbeat to `now`.
    ///
    /// A connection whose acknowledgement deadline has been reached is
    /// expired and removed; a connection whose probe is due gets a new
    /// outstanding probe. Both lists are sorted so callers see a stable order.
    pub fn poll(&mut self, now: Timestamp) -> LivenessSweep {
        let mut sweep = LivenessSweep::default();

        for (connection_id, heartbeat) in self.connections.iter_mut() {
            match heartbeat.ack_deadline {
                Some(deadline) if now >= deadline => sweep.expired.push(*connection_id),
                Some(_) => {}
                None if now >= heartbeat.next_probe_at => {
                    heartbeat.ack_deadline = Some(now + self.config.ack_timeout);
                    heartbeat.next_probe_at = now + self.config.probe_interval;
                    sweep.probe.push(*connection_id);
                }
                None => {}
            }
        }

        for connection_id in &sweep.expired {
            self.connections.remove(connection_id);
        }

        sweep.probe.sort();
        sweep.expired.sort();
        self.stats.probes_sent += sweep.probe.len() as u64;
        self.stats.workers_expired += sweep.expired.len() as u64;
        sweep
    }

    pub fn is_tracked(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Whether a probe to this connection is waiting for its ack
    pub fn is_awaiting_ack(&self, connection_id: &ConnectionId) -> bool {
        self.connections
            .get(connection_id)
            .is_some_and(|heartbeat| heartbeat.ack_deadline.is_some())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn stats(&self) -> &LivenessStats {
        &self.stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
