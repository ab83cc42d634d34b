//! Centralized Configuration Management
//!
//! All tunables of the scheduler live here: round shape and timing, the
//! heartbeat protocol, and CSP channel buffer sizes. Every struct has
//! production defaults and a `testing()` preset with small, fast values.

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::round::RoundPlan;

// ----------------------------------------------------------------------------
// Scheduler Configuration
// ----------------------------------------------------------------------------

/// Round shape and scheduling cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between scheduling ticks
    pub tick_interval: Duration,
    /// Time a worker has to finish a job before it is reclaimed
    pub job_timeout: Duration,
    /// Number of bruteforce ranges built per round
    pub bruteforce_job_count: usize,
    /// Candidates per bruteforce range
    pub bruteforce_job_iterations: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(25),
            job_timeout: Duration::from_secs(60),
            bruteforce_job_count: 3_000,
            bruteforce_job_iterations: 1_000_000,
        }
    }
}

impl SchedulerConfig {
    /// Small rounds and short deadlines for tests
    pub fn testing() -> Self {
        Self {
            tick_interval: Duration::from_millis(5),
            job_timeout: Duration::from_secs(2),
            bruteforce_job_count: 10,
            bruteforce_job_iterations: 1_000,
        }
    }

    /// Fewer, larger ranges for pools of fast workers
    pub fn large_jobs() -> Self {
        Self {
            job_timeout: Duration::from_secs(300),
            bruteforce_job_count: 1_000,
            bruteforce_job_iterations: 10_000_000,
            ..Self::default()
        }
    }

    pub fn round_plan(&self) -> RoundPlan {
        RoundPlan {
            bruteforce_job_count: self.bruteforce_job_count,
            bruteforce_job_iterations: self.bruteforce_job_iterations,
        }
    }
}

// ----------------------------------------------------------------------------
// Liveness Configuration
// ----------------------------------------------------------------------------

/// Heartbeat protocol timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Interval between heartbeat probes
    pub probe_interval: Duration,
    /// Time a worker has to acknowledge a probe
    pub ack_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(5),
            ack_timeout: Duration::from_millis(2_500),
        }
    }
}

impl LivenessConfig {
    pub fn testing() -> Self {
        Self {
            probe_interval: Duration::from_millis(200),
            ack_timeout: Duration::from_millis(100),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for CSP channel buffer sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (operator → scheduler)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (transport → scheduler)
    pub event_buffer_size: usize,
    /// Buffer size for Effect channels (scheduler → transport)
    pub effect_buffer_size: usize,
    /// Buffer size for AppEvent channels (scheduler → operator)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            event_buffer_size: 256, // worker traffic is bursty at round start
            effect_buffer_size: 512,
            app_event_buffer_size: 64,
        }
    }
}

impl ChannelConfig {
    /// Create configuration for high-memory environments
    pub fn high_memory() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 1_024,
            effect_buffer_size: 2_048,
            app_event_buffer_size: 200,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            effect_buffer_size: 100,
            app_event_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Complete scheduler configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrackpoolConfig {
    pub scheduler: SchedulerConfig,
    pub liveness: LivenessConfig,
    pub channels: ChannelConfig,
}

impl CrackpoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> CrackpoolConfigBuilder {
        CrackpoolConfigBuilder::new()
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            scheduler: SchedulerConfig::testing(),
            liveness: LivenessConfig::testing(),
            channels: ChannelConfig::testing(),
        }
    }

    /// Create configuration for a long-running server with many workers
    pub fn server_optimized() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            liveness: LivenessConfig::default(),
            channels: ChannelConfig::high_memory(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_liveness(mut self, liveness: LivenessConfig) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    /// Validate the configuration for consistency and feasibility
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.command_buffer_size == 0 {
            return Err("Command buffer size cannot be zero".into());
        }
        if self.channels.event_buffer_size == 0 {
            return Err("Event buffer size cannot be zero".into());
        }
        if self.channels.effect_buffer_size == 0 {
            return Err("Effect buffer size cannot be zero".into());
        }
        if self.channels.app_event_buffer_size == 0 {
            return Err("App event buffer size cannot be zero".into());
        }

        if self.scheduler.tick_interval.is_zero() {
            return Err("Tick interval cannot be zero".into());
        }
        if self.scheduler.job_timeout.is_zero() {
            return Err("Job timeout cannot be zero".into());
        }
        if self.scheduler.bruteforce_job_iterations == 0 {
            return Err("Bruteforce job iterations cannot be zero".into());
        }

        if self.liveness.probe_interval.is_zero() {
            return Err("Probe interval cannot be zero".into());
        }
        if self.liveness.ack_timeout >= self.liveness.probe_interval {
            return Err("Ack timeout must be shorter than the probe interval".into());
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Configuration Builder Pattern
// ----------------------------------------------------------------------------

/// Builder for CrackpoolConfig that validates on build
#[derive(Debug, Clone, Default)]
pub struct CrackpoolConfigBuilder {
    scheduler: Option<SchedulerConfig>,
    liveness: Option<LivenessConfig>,
    channels: Option<ChannelConfig>,
}

/// Error type for configuration building
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Configuration builder error: {message}")]
pub struct ConfigBuilderError {
    pub message: String,
}

impl CrackpoolConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = Some(config);
        self
    }

    pub fn liveness(mut self, config: LivenessConfig) -> Self {
        self.liveness = Some(config);
        self
    }

    pub fn channels(mut self, config: ChannelConfig) -> Self {
        self.channels = Some(config);
        self
    }

    /// Use testing preset as base (can be further customized)
    pub fn testing(self) -> Self {
        Self {
            scheduler: Some(SchedulerConfig::testing()),
            liveness: Some(LivenessConfig::testing()),
            channels: Some(ChannelConfig::testing()),
        }
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<CrackpoolConfig, ConfigBuilderError> {
        let config = self.build_unchecked();
        config
            .validate()
            .map_err(|message| ConfigBuilderError { message })?;
        Ok(config)
    }

    /// Build the configuration without validation
    pub fn build_unchecked(self) -> CrackpoolConfig {
        CrackpoolConfig {
            scheduler: self.scheduler.unwrap_or_default(),
            liveness: self.liveness.unwrap_or_default(),
            channels: self.channels.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(CrackpoolConfig::default().validate().is_ok());
        assert!(CrackpoolConfig::testing().validate().is_ok());
        assert!(CrackpoolConfig::server_optimized().validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = CrackpoolConfig::default();
        assert_eq!(config.scheduler.tick_interval, Duration::from_millis(25));
        assert_eq!(config.scheduler.job_timeout, Duration::from_secs(60));
        assert_eq!(config.scheduler.bruteforce_job_count, 3_000);
        assert_eq!(config.scheduler.bruteforce_job_iterations, 1_000_000);
        assert_eq!(config.liveness.probe_interval, Duration::from_secs(5));
        assert_eq!(config.liveness.ack_timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn test_ack_timeout_must_be_shorter_than_probe_interval() {
        let err = CrackpoolConfig::builder()
            .liveness(LivenessConfig {
                probe_interval: Duration::from_secs(1),
                ack_timeout: Duration::from_secs(1),
            })
            .build()
            .unwrap_err();
        assert!(err.message.contains("Ack timeout"));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = CrackpoolConfig::testing().with_channels(ChannelConfig {
            effect_buffer_size: 0,
            ..ChannelConfig::testing()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: CrackpoolConfig =
            serde_json::from_str(r#"{"scheduler":{"bruteforce_job_count":5}}"#).unwrap();
        assert_eq!(config.scheduler.bruteforce_job_count, 5);
        assert_eq!(config.scheduler.job_timeout, Duration::from_secs(60));
        assert_eq!(config.liveness, LivenessConfig::default());
    }
}
