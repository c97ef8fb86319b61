//! Pipeline configuration
//!
//! Every knob has a default matching the reference firmware, so an empty YAML
//! document is a valid configuration:
//!
//! ```yaml
//! channel_capacity: 4096
//! trigger_level: 128
//! read_chunk: 1023
//! read_timeout_ms: 10
//! decode_interval_ms: 20
//! max_frames_per_step: 5
//! lock_timeout_ms: 10
//! backpressure: block        # or short_write
//! serial:
//!   path: /dev/ttyUSB0
//!   baud_rate: 115200
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::FRAME_SIZE;
use crate::{Result, TelemetryError};

/// What the ingest task does when the byte channel cannot take a whole read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Wake the decoder, then wait for space until every byte is accepted.
    #[default]
    Block,
    /// Take the short count, wake the decoder, keep the remainder and retry it
    /// on the next iteration before reading the device again.
    ShortWrite,
}

/// Serial link parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub path: String,
    /// Line rate; framing is always 8N1
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { path: "/dev/ttyUSB0".to_string(), baud_rate: 115_200 }
    }
}

/// Tunables for the ingest → decode → project pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Byte channel capacity
    pub channel_capacity: usize,
    /// Unread byte count at which the ingest task wakes the decoder early
    pub trigger_level: usize,
    /// Largest single read from the device
    pub read_chunk: usize,
    /// Bound on each device read
    pub read_timeout_ms: u64,
    /// Decoder tick period
    pub decode_interval_ms: u64,
    /// Candidate frames examined per decoder invocation
    pub max_frames_per_step: usize,
    /// Bound on acquiring the display state lock
    pub lock_timeout_ms: u64,
    /// Producer behaviour on a full channel
    pub backpressure: Backpressure,
    /// Serial link parameters
    pub serial: SerialConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4096,
            trigger_level: 128,
            read_chunk: 1023,
            read_timeout_ms: 10,
            decode_interval_ms: 20,
            max_frames_per_step: 5,
            lock_timeout_ms: 10,
            backpressure: Backpressure::Block,
            serial: SerialConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml_ng::from_str(yaml).map_err(|e| {
            TelemetryError::Parse { context: "pipeline config".to_string(), details: e.to_string() }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity < FRAME_SIZE {
            return Err(TelemetryError::invalid_config(
                "channel_capacity",
                format!("{} is smaller than one frame ({} bytes)", self.channel_capacity, FRAME_SIZE),
            ));
        }
        if self.trigger_level == 0 || self.trigger_level >= self.channel_capacity {
            return Err(TelemetryError::invalid_config(
                "trigger_level",
                format!(
                    "{} must be in 1..{} (below channel_capacity)",
                    self.trigger_level, self.channel_capacity
                ),
            ));
        }
        if self.read_chunk == 0 {
            return Err(TelemetryError::invalid_config("read_chunk", "must be non-zero"));
        }
        if self.max_frames_per_step == 0 {
            return Err(TelemetryError::invalid_config("max_frames_per_step", "must be non-zero"));
        }
        for (field, value) in [
            ("read_timeout_ms", self.read_timeout_ms),
            ("decode_interval_ms", self.decode_interval_ms),
            ("lock_timeout_ms", self.lock_timeout_ms),
        ] {
            if value == 0 {
                return Err(TelemetryError::invalid_config(field, "must be non-zero"));
            }
        }
        if self.serial.baud_rate == 0 {
            return Err(TelemetryError::invalid_config("serial.baud_rate", "must be non-zero"));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn decode_interval(&self) -> Duration {
        Duration::from_millis(self.decode_interval_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Decoder invocations per second at the configured tick.
    pub fn tick_hz(&self) -> f64 {
        1000.0 / self.decode_interval_ms as f64
    }
}
