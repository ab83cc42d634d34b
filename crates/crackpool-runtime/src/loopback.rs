//! In-process transport
//!
//! Connects workers living in the same process (embedders, tests) to the
//! scheduler through plain channels. Each [`LoopbackWorker`] behaves like a
//! socket: frames go in, server events come out, and dropping it closes the
//! connection.

use async_trait::async_trait;
use crackpool_core::{
    channel::{EffectReceiver, EventSender},
    ConnectionId, CrackpoolError, CrackpoolResult, Effect, Event, ServerEvent, TransportError,
    TransportTask, TransportType, WorkerFrame,
};
use hashbrown::HashMap;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

#[derive(Debug)]
enum LoopbackControl {
    Connect {
        connection_id: ConnectionId,
        outbox: mpsc::UnboundedSender<ServerEvent>,
    },
    Frame {
        connection_id: ConnectionId,
        frame: WorkerFrame,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
}

// ----------------------------------------------------------------------------
// Transport Task
// ----------------------------------------------------------------------------

/// Transport task serving in-process workers
pub struct LoopbackTransport {
    event_sender: Option<EventSender>,
    effect_receiver: Option<EffectReceiver>,
    control_receiver: mpsc::UnboundedReceiver<LoopbackControl>,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
}

impl LoopbackTransport {
    /// Create the transport and the connector used to open worker connections
    pub fn new() -> (Self, LoopbackConnector) {
        let (control_sender, control_receiver) = mpsc::unbounded_channel();
        (
            Self {
                event_sender: None,
                effect_receiver: None,
                control_receiver,
                connections: HashMap::new(),
            },
            LoopbackConnector {
                control: control_sender,
            },
        )
    }

    async fn handle_control(
        &mut self,
        event_sender: &EventSender,
        control: LoopbackControl,
    ) -> CrackpoolResult<()> {
        let event = match control {
            LoopbackControl::Connect {
                connection_id,
                outbox,
            } => {
                self.connections.insert(connection_id, outbox);
                Event::WorkerConnected {
                    connection_id,
                    transport: TransportType::Loopback,
                }
            }
            LoopbackControl::Frame {
                connection_id,
                frame,
            } => {
                if !self.connections.contains_key(&connection_id) {
                    debug!(worker = %connection_id, "Dropping frame from closed connection");
                    return Ok(());
                }
                frame.into_event(connection_id)
            }
            LoopbackControl::Disconnect { connection_id } => {
                if self.connections.remove(&connection_id).is_none() {
                    return Ok(());
                }
                Event::WorkerDisconnected {
                    connection_id,
                    reason: "connection closed".to_string(),
                }
            }
        };

        event_sender
            .send(event)
            .await
            .map_err(|_| CrackpoolError::transport_shutdown("Scheduler event channel closed"))
    }

    fn handle_effect(&mut self, effect: Effect) {
        match effect {
            Effect::SendToWorker {
                connection_id,
                event,
            } => {
                let Some(outbox) = self.connections.get(&connection_id) else {
                    return;
                };
                if outbox.send(event).is_err() {
                    debug!(worker = %connection_id, "Worker inbox gone");
                }
            }
            Effect::CloseConnection { connection_id } => {
                if self.connections.remove(&connection_id).is_some() {
                    debug!(worker = %connection_id, "Closed loopback connection");
                }
            }
        }
    }
}

#[async_trait]
impl TransportTask for LoopbackTransport {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> CrackpoolResult<()> {
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> CrackpoolResult<()> {
        let event_sender = self
            .event_sender
            .clone()
            .ok_or(TransportError::NotAttached)?;
        let mut effect_receiver = self
            .effect_receiver
            .take()
            .ok_or(TransportError::NotAttached)?;

        info!("Loopback transport running");
        loop {
            tokio::select! {
                control = self.control_receiver.recv() => {
                    match control {
                        Some(control) => self.handle_control(&event_sender, control).await?,
                        None => {
                            info!("Every loopback connector dropped, stopping");
                            return Ok(());
                        }
                    }
                }

                effect = effect_receiver.recv() => {
                    match effect {
                        Ok(effect) => self.handle_effect(effect),
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "Loopback transport lagged behind the scheduler");
                        }
                        Err(RecvError::Closed) => {
                            info!("Effect channel closed, stopping loopback transport");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Loopback
    }
}

// ----------------------------------------------------------------------------
// Worker Side
// ----------------------------------------------------------------------------

/// Opens connections on a [`LoopbackTransport`]
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    control: mpsc::UnboundedSender<LoopbackControl>,
}

impl LoopbackConnector {
    pub fn connect(&self) -> CrackpoolResult<LoopbackWorker> {
        let connection_id = ConnectionId::new();
        let (outbox, inbox) = mpsc::unbounded_channel();
        self.control
            .send(LoopbackControl::Connect {
                connection_id,
                outbox,
            })
            .map_err(|_| CrackpoolError::transport_shutdown("Loopback transport stopped"))?;

        Ok(LoopbackWorker {
            connection_id,
            control: self.control.clone(),
            inbox,
        })
    }
}

/// One in-process worker connection
#[derive(Debug)]
pub struct LoopbackWorker {
    connection_id: ConnectionId,
    control: mpsc::UnboundedSender<LoopbackControl>,
    inbox: mpsc::UnboundedReceiver<ServerEvent>,
}

impl LoopbackWorker {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn send(&self, frame: WorkerFrame) -> CrackpoolResult<()> {
        self.control
            .send(LoopbackControl::Frame {
                connection_id: self.connection_id,
                frame,
            })
            .map_err(|_| CrackpoolError::transport_shutdown("Loopback transport stopped"))
    }

    /// Send an encoded worker message
    pub fn send_data(&self, data: impl Into<String>) -> CrackpoolResult<()> {
        self.send(WorkerFrame::Data(data.into()))
    }

    /// Next event from the scheduler; `None` once the connection is closed
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.inbox.recv().await
    }

    /// Close the connection
    pub fn disconnect(self) {}
}

impl Drop for LoopbackWorker {
    fn drop(&mut self) {
        let _ = self.control.send(LoopbackControl::Disconnect {
            connection_id: self.connection_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_requires_attached_channels() {
        let (mut transport, _connector) = LoopbackTransport::new();
        assert!(matches!(
            transport.run().await,
            Err(CrackpoolError::Transport(TransportError::NotAttached))
        ));
    }
}
