//! Transport Task Trait Definition
//!
//! Common interface for the tasks that connect workers to the scheduler.
//! Concrete implementations live in their own crates (`crackpool-tcp`).

use crate::channel::{EffectReceiver, EventSender, TransportType};
use crate::errors::Result as CrackpoolResult;

/// Common interface for transport tasks
///
/// A transport task accepts worker connections, assigns each a
/// [`ConnectionId`](crate::types::ConnectionId), turns inbound worker frames
/// into [`Event`](crate::channel::Event)s and executes the
/// [`Effect`](crate::channel::Effect)s addressed to its connections. It shares
/// no state with the scheduler; the runtime spawns and aborts it.
#[async_trait::async_trait]
pub trait TransportTask: Send + Sync {
    /// Attach CSP channels created by the runtime
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> CrackpoolResult<()>;

    /// Run the transport until it is shut down or cancelled
    async fn run(&mut self) -> CrackpoolResult<()>;

    fn transport_type(&self) -> TransportType;
}
