//! Scheduler State Management
//!
//! Contains the scheduler's owned state, statistics, and logger wrapper.

use core::fmt;
use std::sync::Arc;

use crackpool_core::{
    channel::RoundStatus, task_logging::LoggableMessage, AppEvent, CacheRepository, Command,
    ConsoleLogger, CrackpoolConfig, Effect, Event, HashQueue, LogLevel, NoOpLogger, Round,
    SchedulerConfig, TaskId, TaskLogger, TimeSource, Timestamp, WordlistCorpus,
};
use serde::{Deserialize, Serialize};

use crate::managers::{LivenessTracker, WorkerMembership};

// ----------------------------------------------------------------------------
// Scheduler State
// ----------------------------------------------------------------------------

/// Where the scheduler stands with respect to the active round
///
/// `Solved` and `Exhausted` are transient: the next tick reports the outcome
/// and the scheduler returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Idle,
    Running,
    Solved,
    Exhausted,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::Idle => write!(f, "idle"),
            RoundPhase::Running => write!(f, "running"),
            RoundPhase::Solved => write!(f, "solved"),
            RoundPhase::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Everything the scheduler task owns
///
/// Nothing here is shared: handlers borrow it mutably one at a time, so every
/// tick sees one consistent snapshot of the round, the queue and membership.
pub struct SchedulerState<T: TimeSource> {
    pub config: SchedulerConfig,
    pub time_source: T,
    /// Hashes waiting for a round
    pub queue: HashQueue,
    /// The active round, if any
    pub round: Option<Round>,
    /// Number of the most recently started round
    pub rounds_started: u64,
    pub membership: WorkerMembership,
    pub liveness: LivenessTracker,
    pub corpus: Arc<dyn WordlistCorpus>,
    pub cache: Arc<dyn CacheRepository>,
    pub start_time: Timestamp,
    pub stats: SchedulerStats,
}

impl<T: TimeSource> SchedulerState<T> {
    pub fn new(
        config: &CrackpoolConfig,
        time_source: T,
        corpus: Arc<dyn WordlistCorpus>,
        cache: Arc<dyn CacheRepository>,
    ) -> Self {
        let start_time = time_source.now();
        Self {
            config: config.scheduler.clone(),
            time_source,
            queue: HashQueue::new(),
            round: None,
            rounds_started: 0,
            membership: WorkerMembership::new(),
            liveness: LivenessTracker::new(config.liveness.clone()),
            corpus,
            cache,
            start_time,
            stats: SchedulerStats::default(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    pub fn phase(&self) -> RoundPhase {
        match &self.round {
            None => RoundPhase::Idle,
            Some(round) if round.is_solved() => RoundPhase::Solved,
            Some(round) if round.is_exhausted() => RoundPhase::Exhausted,
            Some(_) => RoundPhase::Running,
        }
    }

    pub fn round_status(&self) -> Option<RoundStatus> {
        self.round.as_ref().map(|round| RoundStatus {
            round: round.number(),
            algorithm: round.hash_task().algorithm,
            hash: round.hash_task().hash.clone(),
            progress: round.progress(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.now().duration_since(self.start_time).as_secs()
    }
}

// ----------------------------------------------------------------------------
// Logger Wrapper
// ----------------------------------------------------------------------------

/// Logger wrapper for object safety
#[derive(Debug, Clone)]
pub enum LoggerWrapper {
    Console(ConsoleLogger),
    NoOp(NoOpLogger),
}

impl Default for LoggerWrapper {
    fn default() -> Self {
        LoggerWrapper::NoOp(NoOpLogger)
    }
}

impl LoggerWrapper {
    pub fn console(min_level: LogLevel) -> Self {
        LoggerWrapper::Console(ConsoleLogger::new(min_level))
    }

    fn log_receive<M: LoggableMessage>(&self, from: TaskId, message: &M) {
        match self {
            LoggerWrapper::Console(logger) => logger.log_receive(from, TaskId::Scheduler, message),
            LoggerWrapper::NoOp(logger) => logger.log_receive(from, TaskId::Scheduler, message),
        }
    }

    fn log_send<M: LoggableMessage>(&self, to: TaskId, message: &M) {
        match self {
            LoggerWrapper::Console(logger) => logger.log_send(TaskId::Scheduler, to, message),
            LoggerWrapper::NoOp(logger) => logger.log_send(TaskId::Scheduler, to, message),
        }
    }

    pub fn log_receive_command(&self, message: &Command) {
        self.log_receive(TaskId::Operator, message);
    }

    pub fn log_receive_event(&self, from: TaskId, message: &Event) {
        self.log_receive(from, message);
    }

    pub fn log_send_effect(&self, to: TaskId, message: &Effect) {
        self.log_send(to, message);
    }

    pub fn log_send_app_event(&self, message: &AppEvent) {
        self.log_send(TaskId::Operator, message);
    }

    pub fn log_drop_app_event(&self, message: &AppEvent, reason: &str) {
        match self {
            LoggerWrapper::Console(logger) => {
                logger.log_drop(TaskId::Scheduler, TaskId::Operator, message, reason)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_drop(TaskId::Scheduler, TaskId::Operator, message, reason)
            }
        }
    }

    pub fn log_task_event(&self, level: LogLevel, message: &str) {
        match self {
            LoggerWrapper::Console(logger) => {
                logger.log_task_event(TaskId::Scheduler, level, message)
            }
            LoggerWrapper::NoOp(logger) => logger.log_task_event(TaskId::Scheduler, level, message),
        }
    }
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Statistics for the scheduler task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub ticks: u64,
    pub effects_generated: u64,
    pub app_events_generated: u64,
    pub app_events_dropped: u64,
    pub hashes_queued: u64,
    pub intake_rejections: u64,
    pub malformed_messages: u64,
    pub rounds_started: u64,
    pub rounds_solved: u64,
    pub rounds_exhausted: u64,
    pub rounds_discarded: u64,
    pub jobs_assigned: u64,
    pub jobs_completed: u64,
    pub jobs_reclaimed: u64,
    pub workers_expired: u64,
}
