//! State managers owned by the scheduler task

pub mod liveness;
pub mod membership;

pub use liveness::{LivenessStats, LivenessSweep, LivenessTracker};
pub use membership::{WorkerMembership, WorkerRecord};
