//! Scheduler Task Implementation
//!
//! Contains the SchedulerTask struct and its channel loop.

use crackpool_core::{
    channel::{
        AppEventSender, CommandReceiver, EffectSender, EventReceiver, NonBlockingSend,
    },
    AppEvent, Command, CrackpoolError, CrackpoolResult, Effect, Event, LogLevel, TaskId,
    TimeSource,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::handlers::{HandlerOutput, SchedulerHandlers};
use super::state::{LoggerWrapper, RoundPhase, SchedulerState, SchedulerStats};

// ----------------------------------------------------------------------------
// Scheduler Task
// ----------------------------------------------------------------------------

/// The single owner of the round, the hash queue and worker membership
///
/// Commands, transport events and the scheduling tick are serialized by one
/// `select!` loop; each handler runs to completion before the next starts.
pub struct SchedulerTask<T: TimeSource> {
    state: SchedulerState<T>,
    /// Operator commands
    command_receiver: CommandReceiver,
    /// Worker activity from transport tasks
    event_receiver: EventReceiver,
    /// Outbound effects, broadcast to every transport
    effect_sender: EffectSender,
    /// State changes for the operator
    app_event_sender: AppEventSender,
    logger: LoggerWrapper,
    running: bool,
}

impl<T: TimeSource> SchedulerTask<T> {
    pub fn new(
        state: SchedulerState<T>,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
        logger: LoggerWrapper,
    ) -> Self {
        Self {
            state,
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            logger,
            running: true,
        }
    }

    /// Run until shutdown, a closed command channel or an unrecoverable error
    pub async fn run(&mut self) -> CrackpoolResult<()> {
        self.logger
            .log_task_event(LogLevel::Info, "Scheduler task starting");

        if let Err(e) = self.state.cache.clear_all() {
            warn!("Could not clear job cache on startup: {}", e);
        }

        let mut ticker = tokio::time::interval(self.state.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            self.logger.log_receive_command(&command);
                            let result = self.process_command(command);
                            self.settle(result, "command");
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }

                event = self.event_receiver.recv(), if events_open => {
                    match event {
                        Some(event) => {
                            self.logger.log_receive_event(event_source(&event, &self.state), &event);
                            let result = self.process_event(event);
                            self.settle(result, "event");
                        }
                        None => {
                            info!("Event channel closed");
                            events_open = false;
                        }
                    }
                }

                _ = ticker.tick() => {
                    let result = SchedulerHandlers::handle_tick(&mut self.state)
                        .and_then(|output| self.dispatch(output));
                    self.settle(result, "tick");
                }
            }
        }

        self.logger
            .log_task_event(LogLevel::Info, "Scheduler task stopped");
        Ok(())
    }

    /// Stop the loop after the current iteration
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Log a handler failure; stop on the ones the loop cannot survive
    fn settle(&mut self, result: CrackpoolResult<()>, source: &str) {
        let Err(e) = result else {
            return;
        };
        if e.is_recoverable() {
            warn!("Error processing {}: {}", source, e);
        } else {
            error!("Unrecoverable error processing {}, shutting down scheduler: {}", source, e);
            self.running = false;
        }
    }

    fn process_command(&mut self, command: Command) -> CrackpoolResult<()> {
        self.state.stats.commands_processed += 1;

        let output = match command {
            Command::DisconnectWorker { connection_id } => {
                SchedulerHandlers::handle_disconnect_requested(
                    &mut self.state,
                    connection_id,
                    "disconnected by operator",
                )?
            }
            Command::ClearCache => SchedulerHandlers::handle_clear_cache(&mut self.state)?,
            Command::GetStatus => SchedulerHandlers::handle_get_status(&mut self.state)?,
            Command::Shutdown => {
                info!("Shutdown requested");
                self.running = false;
                (Vec::new(), Vec::new())
            }
        };

        self.dispatch(output)
    }

    fn process_event(&mut self, event: Event) -> CrackpoolResult<()> {
        self.state.stats.events_processed += 1;

        let output = match event {
            Event::WorkerConnected {
                connection_id,
                transport,
            } => SchedulerHandlers::handle_worker_connected(
                &mut self.state,
                connection_id,
                transport,
            )?,
            Event::WorkerDisconnected {
                connection_id,
                reason,
            } => SchedulerHandlers::handle_worker_disconnected(
                &mut self.state,
                connection_id,
                reason,
            )?,
            Event::MessageReceived {
                connection_id,
                data,
            } => SchedulerHandlers::handle_worker_message(&mut self.state, connection_id, &data)?,
            Event::LifecheckAcknowledged { connection_id } => {
                SchedulerHandlers::handle_lifecheck_acknowledged(&mut self.state, connection_id)?
            }
            Event::DisconnectRequested { connection_id } => {
                SchedulerHandlers::handle_disconnect_requested(
                    &mut self.state,
                    connection_id,
                    "disconnect requested",
                )?
            }
            Event::TransportError { transport, error } => {
                SchedulerHandlers::handle_transport_error(transport, error)?
            }
        };

        self.dispatch(output)
    }

    fn dispatch(&mut self, (effects, app_events): HandlerOutput) -> CrackpoolResult<()> {
        for app_event in app_events {
            self.send_app_event(app_event);
        }
        for effect in effects {
            self.send_effect(effect)?;
        }
        Ok(())
    }

    /// Broadcast an effect to the transports
    fn send_effect(&mut self, effect: Effect) -> CrackpoolResult<()> {
        let target = effect_target(&effect, &self.state);
        self.logger.log_send_effect(target, &effect);

        self.effect_sender
            .send(effect)
            .map_err(|_| CrackpoolError::transport_shutdown("Effect channel closed"))?;

        self.state.stats.effects_generated += 1;
        Ok(())
    }

    /// Report to the operator without ever waiting on it
    fn send_app_event(&mut self, app_event: AppEvent) {
        self.logger.log_send_app_event(&app_event);
        match self.app_event_sender.try_send_non_blocking(app_event.clone()) {
            Ok(()) => self.state.stats.app_events_generated += 1,
            Err(e) => {
                self.state.stats.app_events_dropped += 1;
                self.logger.log_drop_app_event(&app_event, &e.to_string());
                debug!("Dropped app event: {}", e);
            }
        }
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.state.stats
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase()
    }

    pub fn state(&self) -> &SchedulerState<T> {
        &self.state
    }
}

/// Logging source of an inbound event
fn event_source<T: TimeSource>(event: &Event, state: &SchedulerState<T>) -> TaskId {
    match event {
        Event::WorkerConnected { transport, .. } | Event::TransportError { transport, .. } => {
            TaskId::Transport(*transport)
        }
        Event::WorkerDisconnected { connection_id, .. }
        | Event::MessageReceived { connection_id, .. }
        | Event::LifecheckAcknowledged { connection_id }
        | Event::DisconnectRequested { connection_id } => worker_task(connection_id, state),
    }
}

fn effect_target<T: TimeSource>(effect: &Effect, state: &SchedulerState<T>) -> TaskId {
    worker_task(&effect.connection_id(), state)
}

fn worker_task<T: TimeSource>(
    connection_id: &crackpool_core::ConnectionId,
    state: &SchedulerState<T>,
) -> TaskId {
    state
        .membership
        .get(connection_id)
        .map(|worker| TaskId::Transport(worker.transport))
        .unwrap_or(TaskId::Operator)
}
