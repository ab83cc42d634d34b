//! Task Communication Logging
//!
//! Traces CSP channel traffic between tasks at debug level. Output goes
//! through `tracing`, so it is filtered and formatted by whatever subscriber
//! the binary installs.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::channel::{AppEvent, Command, Effect, Event, ServerEvent, TransportType};

// ----------------------------------------------------------------------------
// Log Event Types
// ----------------------------------------------------------------------------

/// Log levels for task communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Task identifiers for communication logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskId {
    Scheduler,
    Transport(TransportType),
    Operator,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Scheduler => write!(f, "Scheduler"),
            TaskId::Transport(transport) => write!(f, "Transport({})", transport),
            TaskId::Operator => write!(f, "Operator"),
        }
    }
}

/// Communication direction for channel messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Send,
    Receive,
    Drop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "→"),
            Direction::Receive => write!(f, "←"),
            Direction::Drop => write!(f, "✗"),
        }
    }
}

/// Channel message classification for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Command(&'static str),
    Event(&'static str),
    Effect(&'static str),
    AppEvent(&'static str),
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Command(variant) => write!(f, "Command::{}", variant),
            MessageKind::Event(variant) => write!(f, "Event::{}", variant),
            MessageKind::Effect(variant) => write!(f, "Effect::{}", variant),
            MessageKind::AppEvent(variant) => write!(f, "AppEvent::{}", variant),
        }
    }
}

// ----------------------------------------------------------------------------
// Message Classification
// ----------------------------------------------------------------------------

/// Channel messages that can be traced
pub trait LoggableMessage {
    fn kind(&self) -> MessageKind;
    fn summary(&self) -> String;
}

impl LoggableMessage for Command {
    fn kind(&self) -> MessageKind {
        MessageKind::Command(match self {
            Command::DisconnectWorker { .. } => "DisconnectWorker",
            Command::ClearCache => "ClearCache",
            Command::GetStatus => "GetStatus",
            Command::Shutdown => "Shutdown",
        })
    }

    fn summary(&self) -> String {
        match self {
            Command::DisconnectWorker { connection_id } => format!("worker:{}", connection_id),
            Command::ClearCache => "clearing cache".to_string(),
            Command::GetStatus => "requesting status".to_string(),
            Command::Shutdown => "shutting down".to_string(),
        }
    }
}

impl LoggableMessage for Event {
    fn kind(&self) -> MessageKind {
        MessageKind::Event(match self {
            Event::WorkerConnected { .. } => "WorkerConnected",
            Event::WorkerDisconnected { .. } => "WorkerDisconnected",
            Event::MessageReceived { .. } => "MessageReceived",
            Event::LifecheckAcknowledged { .. } => "LifecheckAcknowledged",
            Event::DisconnectRequested { .. } => "DisconnectRequested",
            Event::TransportError { .. } => "TransportError",
        })
    }

    fn summary(&self) -> String {
        match self {
            Event::WorkerConnected {
                connection_id,
                transport,
            } => format!("worker:{} via:{}", connection_id, transport),
            Event::WorkerDisconnected {
                connection_id,
                reason,
            } => format!("worker:{} reason:{}", connection_id, reason),
            Event::MessageReceived {
                connection_id,
                data,
            } => format!("from:{} data:{:.40}", connection_id, data),
            Event::LifecheckAcknowledged { connection_id }
            | Event::DisconnectRequested { connection_id } => {
                format!("worker:{}", connection_id)
            }
            Event::TransportError { transport, error } => {
                format!("transport:{} error:{}", transport, error)
            }
        }
    }
}

impl LoggableMessage for Effect {
    fn kind(&self) -> MessageKind {
        MessageKind::Effect(match self {
            Effect::SendToWorker { .. } => "SendToWorker",
            Effect::CloseConnection { .. } => "CloseConnection",
        })
    }

    fn summary(&self) -> String {
        match self {
            Effect::SendToWorker {
                connection_id,
                event,
            } => {
                let detail = match event {
                    ServerEvent::Job(job) | ServerEvent::PerformBruteforceJob(job) => {
                        format!("{} {}", job.job_information.kind(), job.id)
                    }
                    ServerEvent::Log(text) | ServerEvent::HashComplete(text) => {
                        format!("{:.40}", text)
                    }
                    ServerEvent::Lifecheck => String::new(),
                };
                format!("to:{} {} {}", connection_id, event.name(), detail)
            }
            Effect::CloseConnection { connection_id } => format!("worker:{}", connection_id),
        }
    }
}

impl LoggableMessage for AppEvent {
    fn kind(&self) -> MessageKind {
        MessageKind::AppEvent(match self {
            AppEvent::WorkerJoined { .. } => "WorkerJoined",
            AppEvent::WorkerLeft { .. } => "WorkerLeft",
            AppEvent::HashQueued { .. } => "HashQueued",
            AppEvent::RoundStarted { .. } => "RoundStarted",
            AppEvent::RoundSolved { .. } => "RoundSolved",
            AppEvent::RoundExhausted { .. } => "RoundExhausted",
            AppEvent::RoundDiscarded { .. } => "RoundDiscarded",
            AppEvent::JobsReclaimed { .. } => "JobsReclaimed",
            AppEvent::StatusReport { .. } => "StatusReport",
            AppEvent::SystemError { .. } => "SystemError",
        })
    }

    fn summary(&self) -> String {
        match self {
            AppEvent::WorkerJoined { connection_id } => format!("worker:{}", connection_id),
            AppEvent::WorkerLeft {
                connection_id,
                reason,
            } => format!("worker:{} reason:{}", connection_id, reason),
            AppEvent::HashQueued { hash, position, .. } => {
                format!("hash:{} position:{}", hash, position)
            }
            AppEvent::RoundStarted { round, hash, jobs, .. } => {
                format!("round:{} hash:{} jobs:{}", round, hash, jobs)
            }
            AppEvent::RoundSolved { round, solved_by, .. } => {
                format!("round:{} by:{}", round, solved_by)
            }
            AppEvent::RoundExhausted { round, .. } | AppEvent::RoundDiscarded { round, .. } => {
                format!("round:{}", round)
            }
            AppEvent::JobsReclaimed { round, count } => format!("round:{} jobs:{}", round, count),
            AppEvent::StatusReport {
                workers, queued, ..
            } => format!("workers:{} queued:{}", workers, queued),
            AppEvent::SystemError { error } => format!("error:{}", error),
        }
    }
}

// ----------------------------------------------------------------------------
// Logger Implementation
// ----------------------------------------------------------------------------

/// Task communication logger
pub trait TaskLogger {
    fn log_send<T: LoggableMessage>(&self, from: TaskId, to: TaskId, message: &T);

    fn log_receive<T: LoggableMessage>(&self, from: TaskId, to: TaskId, message: &T);

    fn log_drop<T: LoggableMessage>(&self, from: TaskId, to: TaskId, message: &T, reason: &str);

    fn log_task_event(&self, task: TaskId, level: LogLevel, message: &str);
}

/// Logger that forwards to `tracing`
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

impl TaskLogger for ConsoleLogger {
    fn log_send<T: LoggableMessage>(&self, from: TaskId, to: TaskId, message: &T) {
        if self.should_log(LogLevel::Debug) {
            tracing::debug!(
                "{} {} {} {} {}",
                from,
                Direction::Send,
                to,
                message.kind(),
                message.summary()
            );
        }
    }

    fn log_receive<T: LoggableMessage>(&self, from: TaskId, to: TaskId, message: &T) {
        if self.should_log(LogLevel::Debug) {
            tracing::debug!(
                "{} {} {} {} {}",
                to,
                Direction::Receive,
                from,
                message.kind(),
                message.summary()
            );
        }
    }

    fn log_drop<T: LoggableMessage>(&self, from: TaskId, to: TaskId, message: &T, reason: &str) {
        if self.should_log(LogLevel::Warn) {
            tracing::warn!(
                "{} {} {} {} {} reason:{}",
                from,
                Direction::Drop,
                to,
                message.kind(),
                message.summary(),
                reason
            );
        }
    }

    fn log_task_event(&self, task: TaskId, level: LogLevel, message: &str) {
        if !self.should_log(level) {
            return;
        }
        match level {
            LogLevel::Trace => tracing::trace!("{} {}", task, message),
            LogLevel::Debug => tracing::debug!("{} {}", task, message),
            LogLevel::Info => tracing::info!("{} {}", task, message),
            LogLevel::Warn => tracing::warn!("{} {}", task, message),
            LogLevel::Error => tracing::error!("{} {}", task, message),
        }
    }
}

/// No-op logger for when channel tracing is disabled
#[derive(Debug, Clone)]
pub struct NoOpLogger;

impl TaskLogger for NoOpLogger {
    fn log_send<T: LoggableMessage>(&self, _from: TaskId, _to: TaskId, _message: &T) {}

    fn log_receive<T: LoggableMessage>(&self, _from: TaskId, _to: TaskId, _message: &T) {}

    fn log_drop<T: LoggableMessage>(
        &self,
        _from: TaskId,
        _to: TaskId,
        _message: &T,
        _reason: &str,
    ) {
    }

    fn log_task_event(&self, _task: TaskId, _level: LogLevel, _message: &str) {}
}
