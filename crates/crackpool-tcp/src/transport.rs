//! TCP transport task
//!
//! Accepts worker connections and gives each a [`ConnectionId`], a reader
//! task turning inbound lines into scheduler events and a writer task
//! draining a bounded queue of outbound frames. The task itself only owns
//! the connection table and executes effects.

use std::net::SocketAddr;

use async_trait::async_trait;
use crackpool_core::{
    channel::{EffectReceiver, EventSender},
    ConnectionId, CrackpoolError, CrackpoolResult, Effect, Event, ServerEvent, TransportError,
    TransportTask, TransportType, WorkerFrame,
};
use hashbrown::HashMap;
use tokio::{
    io::AsyncWriteExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    select,
    sync::{
        broadcast::error::RecvError,
        mpsc::{self, error::TrySendError},
    },
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::config::TcpConfig;
use crate::error::TcpTransportError;
use crate::framing::{decode_frame, encode_frame, FrameReader};

#[derive(Debug)]
enum Outbound {
    Line(String),
    Close,
}

struct Connection {
    peer_addr: SocketAddr,
    outbound: mpsc::Sender<Outbound>,
    reader: JoinHandle<()>,
}

// ----------------------------------------------------------------------------
// TCP Transport Task
// ----------------------------------------------------------------------------

/// TCP transport task implementation using CSP channels
pub struct TcpTransportTask {
    config: TcpConfig,
    listener: Option<TcpListener>,
    /// Channel for sending events to the scheduler
    event_sender: Option<EventSender>,
    /// Channel for receiving effects from the scheduler
    effect_receiver: Option<EffectReceiver>,
    connections: HashMap<ConnectionId, Connection>,
}

impl TcpTransportTask {
    /// Create a transport that binds its listener when it starts running
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            listener: None,
            event_sender: None,
            effect_receiver: None,
            connections: HashMap::new(),
        }
    }

    /// Create a transport with its listener already bound
    pub async fn bind(config: TcpConfig) -> CrackpoolResult<Self> {
        let listener = bind_listener(&config).await?;
        let mut transport = Self::new(config);
        transport.listener = Some(listener);
        Ok(transport)
    }

    /// Address of the bound listener, if bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    async fn run_internal(&mut self) -> CrackpoolResult<()> {
        let event_sender = self
            .event_sender
            .clone()
            .ok_or(TransportError::NotAttached)?;
        let mut effect_receiver = self
            .effect_receiver
            .take()
            .ok_or(TransportError::NotAttached)?;
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => bind_listener(&self.config).await?,
        };
        info!(addr = ?listener.local_addr().ok(), "TCP transport listening");

        let (closed_sender, mut closed_receiver) = mpsc::unbounded_channel();

        let result = loop {
            select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            if let Err(e) = self
                                .open_connection(stream, peer_addr, &event_sender, &closed_sender)
                                .await
                            {
                                break Err(e);
                            }
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            let event = Event::TransportError {
                                transport: TransportType::Tcp,
                                error: e.to_string(),
                            };
                            if event_sender.send(event).await.is_err() {
                                break Err(scheduler_gone());
                            }
                        }
                    }
                }

                effect = effect_receiver.recv() => {
                    match effect {
                        Ok(effect) => self.handle_effect(effect),
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "TCP transport lagged behind the scheduler");
                        }
                        Err(RecvError::Closed) => {
                            info!("Effect channel closed, shutting down TCP transport");
                            break Ok(());
                        }
                    }
                }

                Some(connection_id) = closed_receiver.recv() => {
                    let Some(connection) = self.connections.remove(&connection_id) else {
                        continue;
                    };
                    info!(worker = %connection_id, peer = %connection.peer_addr, "Worker connection closed");
                    let event = Event::WorkerDisconnected {
                        connection_id,
                        reason: "connection closed".to_string(),
                    };
                    if event_sender.send(event).await.is_err() {
                        break Err(scheduler_gone());
                    }
                }
            }
        };

        for (_, connection) in self.connections.drain() {
            connection.reader.abort();
        }
        if let Err(e) = &result {
            error!("TCP transport stopped: {}", e);
        }
        result
    }

    async fn open_connection(
        &mut self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        event_sender: &EventSender,
        closed_sender: &mpsc::UnboundedSender<ConnectionId>,
    ) -> CrackpoolResult<()> {
        let connection_id = ConnectionId::new();
        if let Err(e) = stream.set_nodelay(true) {
            debug!(worker = %connection_id, "Could not set TCP_NODELAY: {}", e);
        }
        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_receiver) = mpsc::channel(self.config.write_queue_size);

        // announce before reading so the scheduler knows the worker before its frames
        event_sender
            .send(Event::WorkerConnected {
                connection_id,
                transport: TransportType::Tcp,
            })
            .await
            .map_err(|_| scheduler_gone())?;

        tokio::spawn(write_loop(connection_id, write_half, outbound_receiver));
        let reader = tokio::spawn(read_loop(
            connection_id,
            read_half,
            self.config.max_frame_len,
            event_sender.clone(),
            outbound.clone(),
            closed_sender.clone(),
        ));

        info!(worker = %connection_id, peer = %peer_addr, "Worker connected");
        self.connections.insert(
            connection_id,
            Connection {
                peer_addr,
                outbound,
                reader,
            },
        );
        Ok(())
    }

    /// Execute one effect; effects for other transports' connections are ignored
    fn handle_effect(&mut self, effect: Effect) {
        match effect {
            Effect::SendToWorker {
                connection_id,
                event,
            } => {
                if let Some(connection) = self.connections.get(&connection_id) {
                    queue_event(connection_id, &connection.outbound, &event);
                }
            }
            Effect::CloseConnection { connection_id } => {
                if let Some(connection) = self.connections.remove(&connection_id) {
                    connection.reader.abort();
                    // pending frames are flushed before the socket closes
                    let _ = connection.outbound.try_send(Outbound::Close);
                    info!(worker = %connection_id, peer = %connection.peer_addr, "Closed worker connection");
                }
            }
        }
    }
}

#[async_trait]
impl TransportTask for TcpTransportTask {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> CrackpoolResult<()> {
        if self.event_sender.is_some() || self.effect_receiver.is_some() {
            return Err(TcpTransportError::InvalidConfiguration {
                reason: "TCP transport channels already attached".to_string(),
            }
            .into());
        }
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> CrackpoolResult<()> {
        self.run_internal().await
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }
}

// ----------------------------------------------------------------------------
// Connection Tasks
// ----------------------------------------------------------------------------

async fn bind_listener(config: &TcpConfig) -> CrackpoolResult<TcpListener> {
    config
        .validate()
        .map_err(|reason| TcpTransportError::InvalidConfiguration { reason })?;
    TcpListener::bind(&config.listen_addr).await.map_err(|source| {
        TcpTransportError::Bind {
            addr: config.listen_addr.clone(),
            source,
        }
        .into()
    })
}

fn scheduler_gone() -> CrackpoolError {
    CrackpoolError::transport_shutdown("Scheduler event channel closed")
}

/// Queue a frame without waiting; a full queue drops the frame
fn queue_event(connection_id: ConnectionId, outbound: &mpsc::Sender<Outbound>, event: &ServerEvent) {
    let line = match encode_frame(event) {
        Ok(line) => line,
        Err(e) => {
            warn!(worker = %connection_id, "Could not encode {}: {}", event.name(), e);
            return;
        }
    };
    match outbound.try_send(Outbound::Line(line)) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(worker = %connection_id, "Write queue full, dropping {}", event.name());
        }
        Err(TrySendError::Closed(_)) => {
            debug!(worker = %connection_id, "Writer gone, dropping {}", event.name());
        }
    }
}

async fn read_loop(
    connection_id: ConnectionId,
    read_half: OwnedReadHalf,
    max_frame_len: usize,
    event_sender: EventSender,
    outbound: mpsc::Sender<Outbound>,
    closed: mpsc::UnboundedSender<ConnectionId>,
) {
    let mut frames = FrameReader::new(read_half, max_frame_len);
    loop {
        match frames.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match decode_frame::<WorkerFrame>(&line) {
                Ok(frame) => {
                    if event_sender.send(frame.into_event(connection_id)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(worker = %connection_id, "Rejected frame: {}", e);
                    queue_event(connection_id, &outbound, &ServerEvent::error(e));
                }
            },
            Ok(None) => {
                debug!(worker = %connection_id, "Connection closed by worker");
                break;
            }
            Err(e) => {
                warn!(worker = %connection_id, "Dropping connection: {}", e);
                break;
            }
        }
    }
    let _ = closed.send(connection_id);
}

async fn write_loop(
    connection_id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Line(line) => {
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    debug!(worker = %connection_id, "Write failed: {}", e);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crackpool_core::channel::{create_effect_channel, create_event_channel, ChannelConfig};

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let transport = TcpTransportTask::bind(TcpConfig::testing()).await.unwrap();
        let addr = transport.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(transport.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_channels_attach_once() {
        let config = ChannelConfig::testing();
        let (event_sender, _events) = create_event_channel(&config);
        let (effect_sender, effects) = create_effect_channel(&config);

        let mut transport = TcpTransportTask::new(TcpConfig::testing());
        transport.attach_channels(event_sender.clone(), effects).unwrap();
        assert!(transport
            .attach_channels(event_sender, effect_sender.subscribe())
            .is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_to_bind() {
        let config = TcpConfig {
            write_queue_size: 0,
            ..TcpConfig::testing()
        };
        assert!(matches!(
            TcpTransportTask::bind(config).await,
            Err(CrackpoolError::Configuration { .. })
        ));
    }
}
