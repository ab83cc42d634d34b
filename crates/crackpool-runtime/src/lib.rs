//! Crackpool Runtime
//!
//! This crate runs the crackpool scheduler:
//! - `SchedulerTask`: the single owner of the round, the hash queue and worker
//!   membership, driven by commands, transport events and a scheduling tick
//! - `LivenessTracker` and `WorkerMembership`, the state managers it owns
//! - `LoopbackTransport`, an in-process transport
//! - `RuntimeBuilder` / `RuntimeHandle` wiring the channels and spawning tasks
//!
//! `crackpool-core` provides the data model and the channel protocol; this
//! crate orchestrates them.

pub mod builder;
pub mod logic;
pub mod loopback;
pub mod managers;

pub use builder::{RuntimeBuilder, RuntimeHandle};
pub use logic::{
    HandlerOutput, LoggerWrapper, RoundPhase, SchedulerHandlers, SchedulerState, SchedulerStats,
    SchedulerTask,
};
pub use loopback::{LoopbackConnector, LoopbackTransport, LoopbackWorker};
pub use managers::*;

// Re-export core types for convenience
pub use crackpool_core::{
    channel::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_effect_receiver, create_event_channel, AppEventReceiver, AppEventSender,
        ChannelError, ChannelStats, CommandReceiver, CommandSender, EffectReceiver, EffectSender,
        EventReceiver, EventSender, NonBlockingSend,
    },
    AppEvent, Command, CrackpoolError, CrackpoolResult, Effect, Event, ServerEvent,
    TransportTask, TransportType, WorkerFrame,
};
