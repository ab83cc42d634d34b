//! Crackpool Core
//!
//! Data model and protocol of the crackpool distributed hash cracking
//! scheduler: keyspace counter arithmetic, job partitioning, the worker wire
//! codec, hash intake, the round model, the collaborator traits (wordlist
//! corpus, job cache, transport task), the CSP channel protocol and
//! configuration. The scheduler task itself lives in `crackpool-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod cache;
pub mod channel;
pub mod config;
pub mod corpus;
pub mod counter;
pub mod errors;
pub mod hash;
pub mod intake;
pub mod job;
pub mod message;
pub mod round;
pub mod task_logging;
pub mod transport_task;
pub mod types;
pub mod worker;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use cache::{CacheRepository, InMemoryCacheRepository};
pub use channel::{
    AppEvent, ChannelConfig, Command, Effect, Event, ServerEvent, TransportType, WorkerFrame,
};
pub use config::{CrackpoolConfig, LivenessConfig, SchedulerConfig};
pub use corpus::{split_wordlist, DirectoryCorpus, InMemoryCorpus, WordlistCorpus};
pub use errors::{
    CorpusError, CrackpoolError, CrackpoolResult, IntakeError, ProtocolError, Result, RoundError,
    TransportError,
};
pub use hash::{HashAlgorithm, HashTask};
pub use intake::HashQueue;
pub use job::{BruteforceJob, Job, JobId, JobInformation, WordlistJob};
pub use message::{Message, MessageType};
pub use round::{Round, RoundPlan, RoundProgress};
pub use task_logging::{ConsoleLogger, LogLevel, NoOpLogger, TaskId, TaskLogger};
pub use transport_task::TransportTask;
pub use types::{ConnectionId, ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
pub use worker::JobResult;
