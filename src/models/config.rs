use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration from georank.yaml
///
/// Every section has defaults, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoConfig {
    #[serde(default)]
    pub acquisition: AcquisitionSettings,

    #[serde(default)]
    pub permission: PermissionSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub state: StateSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub platform: PlatformSettings,
}

/// One rung of the retry ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderStep {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl LadderStep {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn maximum_age(&self) -> Duration {
        Duration::from_millis(self.maximum_age_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Hardware options per consecutive failure count; the last entry repeats
    #[serde(default = "default_retry_ladder")]
    pub retry_ladder: Vec<LadderStep>,

    /// Minimum movement in degrees (either axis) before the cached position changes
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold_deg: f64,

    /// Consecutive transient failures before the service reports itself degraded
    #[serde(default = "default_degraded_after_failures")]
    pub degraded_after_failures: u32,
}

impl AcquisitionSettings {
    /// Ladder entry for the given number of consecutive failures
    pub fn ladder_step(&self, attempt_count: u32) -> LadderStep {
        let last = self.retry_ladder.len().saturating_sub(1);
        let index = (attempt_count as usize).min(last);
        self.retry_ladder
            .get(index)
            .copied()
            .unwrap_or_else(|| default_retry_ladder()[0])
    }
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            retry_ladder: default_retry_ladder(),
            significance_threshold_deg: default_significance_threshold(),
            degraded_after_failures: default_degraded_after_failures(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSettings {
    /// Timeout of the background probe used to see through a stale "prompt" report
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Delay before the post-initialization safety check runs
    #[serde(default = "default_safety_check_delay_ms")]
    pub safety_check_delay_ms: u64,
}

impl PermissionSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn safety_check_delay(&self) -> Duration {
        Duration::from_millis(self.safety_check_delay_ms)
    }
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            safety_check_delay_ms: default_safety_check_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSettings {
    /// Capacity of the state change broadcast channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_true")]
    pub console_output: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            debug_mode: false,
            console_output: true,
        }
    }
}

/// Settings for the scripted platform used by the command-line front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// User agent string used for platform family detection
    #[serde(default)]
    pub user_agent: String,

    /// Permission state the scripted permission query reports
    #[serde(default = "default_reported_permission")]
    pub reported_permission: crate::models::PermissionState,

    /// Fix the scripted hardware reports, if any
    #[serde(default)]
    pub simulated_fix: Option<SimulatedFix>,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            reported_permission: default_reported_permission(),
            simulated_fix: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedFix {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

fn default_retry_ladder() -> Vec<LadderStep> {
    vec![
        LadderStep {
            high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 0,
        },
        LadderStep {
            high_accuracy: false,
            timeout_ms: 15_000,
            maximum_age_ms: 5 * 60 * 1000,
        },
        LadderStep {
            high_accuracy: false,
            timeout_ms: 20_000,
            maximum_age_ms: 10 * 60 * 1000,
        },
    ]
}

fn default_significance_threshold() -> f64 {
    0.0001
}

fn default_degraded_after_failures() -> u32 {
    3
}

fn default_probe_timeout_ms() -> u64 {
    100
}

fn default_safety_check_delay_ms() -> u64 {
    1000
}

fn default_interval_secs() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    100
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "georank".to_string()
}

fn default_true() -> bool {
    true
}

fn default_reported_permission() -> crate::models::PermissionState {
    crate::models::PermissionState::Prompt
}
