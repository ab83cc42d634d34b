//! Channel Module
//!
//! CSP channel infrastructure between the scheduler, its transports and the
//! operator:
//! - `communication`: commands, events, effects, app events and wire frames
//! - `utils`: channel type aliases, constructors and send helpers

pub mod communication;
pub mod utils;

pub use communication::{
    AppEvent, Command, Effect, Event, RoundStatus, ServerEvent, TransportType, WorkerFrame,
};

pub use crate::config::ChannelConfig;

pub use utils::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_event_channel, AppEventReceiver, AppEventSender,
    ChannelError, ChannelStats, CommandReceiver, CommandSender, EffectReceiver, EffectSender,
    EventReceiver, EventSender, NonBlockingSend,
};
