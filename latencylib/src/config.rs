use std::io::Read;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::buffer::BufferKind;

/// How each working set size is measured
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// The floor on the number of timed reads in one measurement
    pub min_accesses: u64,
    /// Measurements per size, reduced by median
    pub repeats: u32,
    /// Whether to do an untimed walk before timing
    pub warmup: bool,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            min_accesses: 1_000_000,
            repeats: 3,
            warmup: true,
        }
    }
}

/// A full sweep configuration. Every field has a default, so `{}` is a valid config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub min_bytes: u64,
    pub max_bytes: u64,
    pub stride_bytes: u64,
    pub measurement: MeasurementConfig,
    /// The layouts to measure. Always reported contiguous first, whatever order they're listed in
    pub kinds: Vec<BufferKind>,
    /// Indirect buffers are walked with `min_accesses / indirect_access_divisor` reads, as each
    /// read costs far more. 1 uses the same floor for both
    pub indirect_access_divisor: u64,
    /// Buffers whose estimated footprint is over this many bytes are reported as unavailable
    /// without being built
    pub memory_limit: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_bytes: 16 * 1024,
            max_bytes: 512 * 1024 * 1024,
            stride_bytes: 64,
            measurement: MeasurementConfig::default(),
            kinds: BufferKind::ALL.to_vec(),
            indirect_access_divisor: 10,
            memory_limit: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the stride must be at least one byte")]
    ZeroStride,
    #[error("at least one repeat is needed")]
    ZeroRepeats,
    #[error("at least one access per measurement is needed")]
    ZeroAccesses,
    #[error("the indirect access divisor must be at least one")]
    ZeroDivisor,
    #[error("couldn't parse the config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SweepConfig {
    /// Reads a config from JSON, and validates it. Kinds are put into reporting order with
    /// repeats removed, so `["list", "array", "contiguous"]` measures each layout once
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let mut config: SweepConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        config.kinds = BufferKind::ordered(&config.kinds);
        Ok(config)
    }

    /// Checks the values the measurement code can't work with. Inverted bounds or an empty list of
    /// kinds are fine, they just produce an empty sweep
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stride_bytes == 0 {
            return Err(ConfigError::ZeroStride);
        }
        if self.measurement.repeats == 0 {
            return Err(ConfigError::ZeroRepeats);
        }
        if self.measurement.min_accesses == 0 {
            return Err(ConfigError::ZeroAccesses);
        }
        if self.indirect_access_divisor == 0 {
            return Err(ConfigError::ZeroDivisor);
        }
        Ok(())
    }

    /// Gets the access floor for a layout
    pub fn min_accesses_for(&self, kind: BufferKind) -> u64 {
        match kind {
            BufferKind::Contiguous => self.measurement.min_accesses,
            BufferKind::Indirect => {
                (self.measurement.min_accesses / self.indirect_access_divisor.max(1)).max(1)
            }
        }
    }
}
