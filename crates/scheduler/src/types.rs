use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// What a bounded queue does with a submission it cannot hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the entry and count it. The returned handle never finishes.
    #[default]
    Drop,
    /// Fail the submission with `SubmitError::QueueFull`.
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::Invalid(format!("unknown overflow policy: {other}"))),
        }
    }
}

/// How the pump treats a task that blocked on another awaitable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// Put it back and resume it again on its next rotation, ready or not.
    #[default]
    Requeue,
    /// Keep rotating it without resuming until the awaited object is ready.
    AwaitReady,
}

impl FromStr for BlockPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requeue" => Ok(Self::Requeue),
            "await_ready" | "await-ready" => Ok(Self::AwaitReady),
            other => Err(ConfigError::Invalid(format!("unknown block policy: {other}"))),
        }
    }
}

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Queue capacity. 0 = unbounded.
    #[serde(default)]
    pub capacity: usize,
    /// Overflow handling for a bounded queue.
    #[serde(default)]
    pub overflow: OverflowPolicy,
    /// Handling of blocking steps.
    #[serde(default)]
    pub block_policy: BlockPolicy,
    /// Threads started by `PumpPool::from_config`. 0 = available parallelism.
    #[serde(default = "default_pump_threads")]
    pub pump_threads: usize,
    /// Pause taken by a busy loop after finding the queue empty. 0 = yield only.
    #[serde(default)]
    pub idle_sleep_us: u64,
}

fn default_pump_threads() -> usize { 1 }

/// Upper bound on owned pump threads.
const MAX_PUMP_THREADS: usize = 1024;

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            overflow: OverflowPolicy::default(),
            block_policy: BlockPolicy::default(),
            pump_threads: default_pump_threads(),
            idle_sleep_us: 0,
        }
    }
}

impl SchedulerConfig {
    /// Bounded queue with the given capacity, everything else default.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Parse config from a TOML string, then apply `PILE_*` overrides.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus `PILE_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Resolve pump thread count (0 means use available parallelism).
    pub fn resolved_pump_threads(&self) -> usize {
        if self.pump_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.pump_threads
        }
    }

    /// Sleep between idle polls, if any.
    pub fn idle_pause(&self) -> Option<Duration> {
        (self.idle_sleep_us > 0).then(|| Duration::from_micros(self.idle_sleep_us))
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// - `PILE_QUEUE_CAPACITY` → `capacity`
    /// - `PILE_OVERFLOW` → `overflow`
    /// - `PILE_BLOCK_POLICY` → `block_policy`
    /// - `PILE_PUMP_THREADS` → `pump_threads`
    /// - `PILE_IDLE_SLEEP_US` → `idle_sleep_us`
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PILE_QUEUE_CAPACITY") {
            override_parsed("PILE_QUEUE_CAPACITY", &v, &mut self.capacity);
        }
        if let Some(v) = lookup("PILE_OVERFLOW") {
            override_parsed("PILE_OVERFLOW", &v, &mut self.overflow);
        }
        if let Some(v) = lookup("PILE_BLOCK_POLICY") {
            override_parsed("PILE_BLOCK_POLICY", &v, &mut self.block_policy);
        }
        if let Some(v) = lookup("PILE_PUMP_THREADS") {
            override_parsed("PILE_PUMP_THREADS", &v, &mut self.pump_threads);
        }
        if let Some(v) = lookup("PILE_IDLE_SLEEP_US") {
            override_parsed("PILE_IDLE_SLEEP_US", &v, &mut self.idle_sleep_us);
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.overflow == OverflowPolicy::Reject && self.capacity == 0 {
            return Err(ConfigError::Invalid(
                "overflow = \"reject\" requires a bounded queue (capacity > 0)".into(),
            ));
        }
        if self.pump_threads > MAX_PUMP_THREADS {
            return Err(ConfigError::Invalid(format!(
                "pump_threads = {} exceeds the limit of {MAX_PUMP_THREADS}",
                self.pump_threads
            )));
        }
        Ok(())
    }
}

fn override_parsed<T: FromStr>(key: &str, raw: &str, target: &mut T) {
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!(key, value = raw, "ignoring unparsable override"),
    }
}
