//! Scheduler Logic
//!
//! The scheduler task and everything it owns:
//! - `state`: owned state, statistics and the task logger wrapper
//! - `handlers`: command, event and tick handlers
//! - `task`: the channel loop driving the handlers

pub mod handlers;
pub mod state;
pub mod task;

pub use handlers::{HandlerOutput, SchedulerHandlers};
pub use state::{LoggerWrapper, RoundPhase, SchedulerState, SchedulerStats};
pub use task::SchedulerTask;
