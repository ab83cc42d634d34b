//! CSP Channel Communication Protocol Types
//!
//! All inter-task communication flows through these channel message types:
//! transports report worker activity as [`Event`]s, the operator drives the
//! scheduler with [`Command`]s, the scheduler answers with [`Effect`]s for the
//! transports and [`AppEvent`]s for the operator. [`ServerEvent`] and
//! [`WorkerFrame`] are the frames exchanged with workers on the wire.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::hash::HashAlgorithm;
use crate::job::Job;
use crate::round::RoundProgress;
use crate::types::ConnectionId;

// ----------------------------------------------------------------------------
// Command: Operator → Scheduler
// ----------------------------------------------------------------------------

/// Commands sent from the operator to the scheduler task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Drop a worker as if its connection had closed
    DisconnectWorker { connection_id: ConnectionId },
    /// Drop every cached job
    ClearCache,
    /// Request a status report
    GetStatus,
    /// Shutdown the scheduler gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Transport → Scheduler
// ----------------------------------------------------------------------------

/// Events sent from transport tasks to the scheduler task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A worker connected
    WorkerConnected {
        connection_id: ConnectionId,
        transport: TransportType,
    },
    /// A worker connection closed
    WorkerDisconnected {
        connection_id: ConnectionId,
        reason: String,
    },
    /// A worker sent a `data` message
    MessageReceived {
        connection_id: ConnectionId,
        data: String,
    },
    /// A worker answered a heartbeat probe
    LifecheckAcknowledged { connection_id: ConnectionId },
    /// A worker asked to be disconnected
    DisconnectRequested { connection_id: ConnectionId },
    /// Transport-specific error occurred
    TransportError {
        transport: TransportType,
        error: String,
    },
}

// ----------------------------------------------------------------------------
// Effect: Scheduler → Transport
// ----------------------------------------------------------------------------

/// Effects sent from the scheduler task to transport tasks
///
/// Delivery is fire-and-forget: the scheduler never waits on worker I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Deliver an event to one worker
    SendToWorker {
        connection_id: ConnectionId,
        event: ServerEvent,
    },
    /// Close a worker connection
    CloseConnection { connection_id: ConnectionId },
}

impl Effect {
    pub fn send(connection_id: ConnectionId, event: ServerEvent) -> Self {
        Effect::SendToWorker {
            connection_id,
            event,
        }
    }

    /// Connection this effect targets
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Effect::SendToWorker { connection_id, .. } => *connection_id,
            Effect::CloseConnection { connection_id } => *connection_id,
        }
    }
}

// ----------------------------------------------------------------------------
// AppEvent: Scheduler → Operator
// ----------------------------------------------------------------------------

/// State changes reported by the scheduler task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    WorkerJoined {
        connection_id: ConnectionId,
    },
    WorkerLeft {
        connection_id: ConnectionId,
        reason: String,
    },
    HashQueued {
        submitter_id: ConnectionId,
        algorithm: HashAlgorithm,
        hash: String,
        position: usize,
    },
    RoundStarted {
        round: u64,
        algorithm: HashAlgorithm,
        hash: String,
        jobs: usize,
    },
    RoundSolved {
        round: u64,
        hash: String,
        solution: String,
        solved_by: ConnectionId,
    },
    RoundExhausted {
        round: u64,
        hash: String,
    },
    /// The submitter left before the round finished
    RoundDiscarded {
        round: u64,
        hash: String,
    },
    JobsReclaimed {
        round: u64,
        count: usize,
    },
    /// Status report in response to [`Command::GetStatus`]
    StatusReport {
        workers: usize,
        queued: usize,
        round: Option<RoundStatus>,
        uptime_seconds: u64,
    },
    SystemError {
        error: String,
    },
}

// ----------------------------------------------------------------------------
// Wire Frames
// ----------------------------------------------------------------------------

/// Events pushed from the scheduler to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ServerEvent {
    /// A job to search
    #[serde(rename = "job")]
    Job(Job),
    /// Informational or error text
    #[serde(rename = "log")]
    Log(String),
    /// Heartbeat probe; answer with [`WorkerFrame::Lifecheck`]
    #[serde(rename = "lifecheck")]
    Lifecheck,
    /// Final outcome of a round the worker submitted or solved
    #[serde(rename = "hash-complete")]
    HashComplete(String),
    /// Bruteforce job to run off the connection's I/O path
    #[serde(rename = "perform-bruteforce-job")]
    PerformBruteforceJob(Job),
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Job(_) => "job",
            ServerEvent::Log(_) => "log",
            ServerEvent::Lifecheck => "lifecheck",
            ServerEvent::HashComplete(_) => "hash-complete",
            ServerEvent::PerformBruteforceJob(_) => "perform-bruteforce-job",
        }
    }

    pub fn error(message: impl fmt::Display) -> Self {
        ServerEvent::Log(format!("[ERROR]: {}", message))
    }
}

/// Frames sent from a worker to the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum WorkerFrame {
    /// An encoded worker message (`<type>:<algorithm>:<payload>`)
    #[serde(rename = "data")]
    Data(String),
    /// Heartbeat acknowledgement
    #[serde(rename = "lifecheck")]
    Lifecheck,
    /// Ask the scheduler to drop this connection
    #[serde(rename = "forceDisconnect")]
    ForceDisconnect,
}

impl WorkerFrame {
    /// The scheduler event this frame stands for
    pub fn into_event(self, connection_id: ConnectionId) -> Event {
        match self {
            WorkerFrame::Data(data) => Event::MessageReceived {
                connection_id,
                data,
            },
            WorkerFrame::Lifecheck => Event::LifecheckAcknowledged { connection_id },
            WorkerFrame::ForceDisconnect => Event::DisconnectRequested { connection_id },
        }
    }
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Transport mechanism identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    Tcp,
    /// In-process channels, used by embedders and tests
    Loopback,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportType::Tcp => write!(f, "TCP"),
            TransportType::Loopback => write!(f, "Loopback"),
        }
    }
}

/// Summary of the active round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStatus {
    pub round: u64,
    pub algorithm: HashAlgorithm,
    pub hash: String,
    pub progress: RoundProgress,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
