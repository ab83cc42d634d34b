//! Channel Utilities for CSP Communication

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::channel::communication::{AppEvent, Command, Effect, Event};
use crate::config::ChannelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    ChannelFull,
    ChannelClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ChannelFull => write!(f, "Channel buffer is full"),
            ChannelError::ChannelClosed => write!(f, "Channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;
pub type EventSender = tokio::sync::mpsc::Sender<Event>;
pub type EventReceiver = tokio::sync::mpsc::Receiver<Event>;
pub type EffectSender = tokio::sync::broadcast::Sender<Effect>;
pub type EffectReceiver = tokio::sync::broadcast::Receiver<Effect>;
pub type AppEventSender = tokio::sync::mpsc::Sender<AppEvent>;
pub type AppEventReceiver = tokio::sync::mpsc::Receiver<AppEvent>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded command channel (operator → scheduler)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    tokio::sync::mpsc::channel(config.command_buffer_size)
}

/// Create bounded event channel (transports → scheduler)
pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::channel(config.event_buffer_size)
}

/// Create broadcast effect channel (scheduler → transports)
///
/// Transports get their own receivers with [`create_effect_receiver`]. A slow
/// transport lags and loses the oldest effects instead of blocking the
/// scheduler.
pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
    tokio::sync::broadcast::channel(config.effect_buffer_size)
}

/// Subscribe a transport to the effect broadcast
pub fn create_effect_receiver(effect_sender: &EffectSender) -> EffectReceiver {
    effect_sender.subscribe()
}

/// Create bounded app event channel (scheduler → operator)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    tokio::sync::mpsc::channel(config.app_event_buffer_size)
}

// ----------------------------------------------------------------------------
// Non-blocking Send Utilities
// ----------------------------------------------------------------------------

/// Non-blocking send so the scheduler never stalls on a slow consumer
pub trait NonBlockingSend<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl<T> NonBlockingSend<T> for tokio::sync::mpsc::Sender<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError> {
        self.try_send(message).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}

// ----------------------------------------------------------------------------
// Channel Health Monitoring
// ----------------------------------------------------------------------------

/// Delivery counters for one channel
#[derive(Debug)]
pub struct ChannelStats {
    pub channel_type: &'static str,
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
}

impl ChannelStats {
    pub fn new(channel_type: &'static str) -> Self {
        Self {
            channel_type,
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    pub fn record_send_success(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    /// Fraction of sends that were dropped
    pub fn drop_rate(&self) -> f32 {
        let sent = self.messages_sent();
        let dropped = self.messages_dropped();
        if sent + dropped == 0 {
            0.0
        } else {
            dropped as f32 / (sent + dropped) as f32
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionId;

    #[test]
    fn test_channel_stats() {
        let stats = ChannelStats::new("test");
        assert_eq!(stats.drop_rate(), 0.0);

        stats.record_send_success();
        stats.record_send_success();
        stats.record_send_dropped();

        assert_eq!(stats.messages_sent(), 2);
        assert_eq!(stats.messages_dropped(), 1);
        assert!((stats.drop_rate() - 0.333).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_command_channel_creation() {
        let config = ChannelConfig::default();
        let (sender, mut receiver) = create_command_channel(&config);

        sender.send(Command::GetStatus).await.unwrap();
        assert!(matches!(receiver.recv().await, Some(Command::GetStatus)));
    }

    #[test]
    fn test_non_blocking_send_reports_full_and_closed() {
        let config = ChannelConfig {
            app_event_buffer_size: 1,
            ..ChannelConfig::testing()
        };
        let (sender, receiver) = create_app_event_channel(&config);
        let event = || AppEvent::WorkerJoined {
            connection_id: ConnectionId::new(),
        };

        assert_eq!(sender.try_send_non_blocking(event()), Ok(()));
        assert_eq!(
            sender.try_send_non_blocking(event()),
            Err(ChannelError::ChannelFull)
        );
        drop(receiver);
        assert_eq!(
            sender.try_send_non_blocking(event()),
            Err(ChannelError::ChannelClosed)
        );
    }

    #[test]
    fn test_effects_fan_out_to_every_transport() {
        let (sender, _keep) = create_effect_channel(&ChannelConfig::testing());
        let mut first = create_effect_receiver(&sender);
        let mut second = create_effect_receiver(&sender);
        let target = ConnectionId::new();

        sender
            .send(Effect::CloseConnection {
                connection_id: target,
            })
            .unwrap();
        assert_eq!(first.try_recv().unwrap().connection_id(), target);
        assert_eq!(second.try_recv().unwrap().connection_id(), target);
    }
}
