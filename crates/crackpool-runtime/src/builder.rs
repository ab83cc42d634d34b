//! Runtime Builder API
//!
//! Provides a builder-style API for consumers (CLI, embedders, tests) to
//! register a corpus, a cache and transports, start the scheduler and get
//! command/app-event handles back.

use std::sync::Arc;

use crackpool_core::{
    channel::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_effect_receiver, create_event_channel, AppEventReceiver, CommandSender,
        EffectReceiver, EffectSender, EventSender,
    },
    CacheRepository, Command, CrackpoolConfig, CrackpoolError, CrackpoolResult,
    InMemoryCacheRepository, InMemoryCorpus, LogLevel, SystemTimeSource, TimeSource,
    TransportTask, WordlistCorpus,
};
use tokio::{task::JoinHandle, time::Duration};
use tracing::{info, warn};

use crate::logic::{LoggerWrapper, SchedulerState, SchedulerTask};

/// How long `shutdown` waits for the scheduler before giving up on it
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a crackpool scheduler runtime
pub struct RuntimeBuilder<T: TimeSource = SystemTimeSource> {
    config: CrackpoolConfig,
    time_source: T,
    corpus: Arc<dyn WordlistCorpus>,
    cache: Arc<dyn CacheRepository>,
    transports: Vec<Box<dyn TransportTask>>,
    logger: LoggerWrapper,
}

impl RuntimeBuilder<SystemTimeSource> {
    /// Builder with default configuration, an empty corpus and an in-memory cache
    pub fn new() -> Self {
        Self {
            config: CrackpoolConfig::default(),
            time_source: SystemTimeSource,
            corpus: Arc::new(InMemoryCorpus::new()),
            cache: Arc::new(InMemoryCacheRepository::new()),
            transports: Vec::new(),
            logger: LoggerWrapper::default(),
        }
    }
}

impl Default for RuntimeBuilder<SystemTimeSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeSource + 'static> RuntimeBuilder<T> {
    pub fn with_config(mut self, config: CrackpoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Use another clock for job deadlines and heartbeats
    pub fn with_time_source<U: TimeSource + 'static>(self, time_source: U) -> RuntimeBuilder<U> {
        RuntimeBuilder {
            config: self.config,
            time_source,
            corpus: self.corpus,
            cache: self.cache,
            transports: self.transports,
            logger: self.logger,
        }
    }

    pub fn with_corpus(mut self, corpus: Arc<dyn WordlistCorpus>) -> Self {
        self.corpus = corpus;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheRepository>) -> Self {
        self.cache = cache;
        self
    }

    /// Add a transport task
    pub fn add_transport(mut self, transport: Box<dyn TransportTask>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Trace channel traffic through the task logger
    pub fn with_console_logging(mut self, level: LogLevel) -> Self {
        self.logger = LoggerWrapper::console(level);
        self
    }

    pub fn with_no_logging(mut self) -> Self {
        self.logger = LoggerWrapper::default();
        self
    }

    /// Validate the configuration, then spawn the scheduler and every transport
    pub async fn build_and_start(self) -> CrackpoolResult<RuntimeHandle> {
        self.config
            .validate()
            .map_err(CrackpoolError::config_error)?;
        info!("Starting crackpool runtime");

        let channels = &self.config.channels;
        let (command_sender, command_receiver) = create_command_channel(channels);
        let (event_sender, event_receiver) = create_event_channel(channels);
        let (effect_sender, _effect_receiver) = create_effect_channel(channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(channels);

        let mut transport_handles = Vec::new();
        for mut transport in self.transports {
            transport.attach_channels(event_sender.clone(), create_effect_receiver(&effect_sender))?;
            let transport_type = transport.transport_type();
            transport_handles.push(tokio::spawn(async move {
                let result = transport.run().await;
                if let Err(e) = &result {
                    warn!(transport = %transport_type, "Transport stopped with error: {}", e);
                }
                result
            }));
        }

        let state = SchedulerState::new(&self.config, self.time_source, self.corpus, self.cache);
        let mut scheduler = SchedulerTask::new(
            state,
            command_receiver,
            event_receiver,
            effect_sender.clone(),
            app_event_sender,
            self.logger,
        );
        let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

        info!(transports = transport_handles.len(), "Crackpool runtime started");

        Ok(RuntimeHandle {
            command_sender,
            event_sender,
            effect_sender,
            app_event_receiver: Some(app_event_receiver),
            scheduler_handle: Some(scheduler_handle),
            transport_handles,
            running: true,
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running scheduler
pub struct RuntimeHandle {
    command_sender: CommandSender,
    event_sender: EventSender,
    effect_sender: EffectSender,
    app_event_receiver: Option<AppEventReceiver>,
    scheduler_handle: Option<JoinHandle<CrackpoolResult<()>>>,
    transport_handles: Vec<JoinHandle<CrackpoolResult<()>>>,
    running: bool,
}

impl RuntimeHandle {
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// Sender for injecting worker events, for embedders acting as a transport
    pub fn event_sender(&self) -> EventSender {
        self.event_sender.clone()
    }

    /// Observe every effect the scheduler emits from now on
    pub fn subscribe_effects(&self) -> EffectReceiver {
        create_effect_receiver(&self.effect_sender)
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    pub async fn send_command(&self, command: Command) -> CrackpoolResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| CrackpoolError::channel_error("Failed to send command to scheduler"))
    }

    pub fn is_running(&self) -> bool {
        self.running
            && self
                .scheduler_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the scheduler to stop on its own
    pub async fn wait(&mut self) -> CrackpoolResult<()> {
        let Some(handle) = self.scheduler_handle.take() else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(CrackpoolError::channel_error(format!(
                "Scheduler task panicked: {}",
                e
            ))),
        }
    }

    /// Stop the scheduler, then abort the transports
    pub async fn shutdown(&mut self) -> CrackpoolResult<()> {
        info!("Shutting down crackpool runtime");

        let _ = self.send_command(Command::Shutdown).await;
        if let Some(handle) = self.scheduler_handle.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                warn!("Scheduler did not stop in time");
            }
        }

        for handle in &self.transport_handles {
            handle.abort();
        }

        self.running = false;
        info!("Crackpool runtime shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crackpool_core::{AppEvent, ChannelConfig, SchedulerConfig};

    #[tokio::test]
    async fn test_runtime_reports_status_and_shuts_down() {
        let mut runtime = RuntimeBuilder::new()
            .with_config(CrackpoolConfig::testing())
            .build_and_start()
            .await
            .expect("runtime starts");
        let mut app_events = runtime.take_app_event_receiver().expect("receiver");
        assert!(runtime.take_app_event_receiver().is_none());
        assert!(runtime.is_running());

        runtime.send_command(Command::GetStatus).await.unwrap();
        let report = tokio::time::timeout(Duration::from_secs(2), app_events.recv())
            .await
            .expect("status in time");
        assert!(matches!(
            report,
            Some(AppEvent::StatusReport { workers: 0, queued: 0, round: None, .. })
        ));

        runtime.shutdown().await.unwrap();
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = CrackpoolConfig::testing().with_channels(ChannelConfig {
            command_buffer_size: 0,
            ..ChannelConfig::testing()
        });
        let result = RuntimeBuilder::new().with_config(config).build_and_start().await;
        assert!(matches!(result, Err(CrackpoolError::Configuration { .. })));

        let config = CrackpoolConfig::testing().with_scheduler(SchedulerConfig {
            bruteforce_job_iterations: 0,
            ..SchedulerConfig::testing()
        });
        assert!(RuntimeBuilder::new().with_config(config).build_and_start().await.is_err());
    }
}
