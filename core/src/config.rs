//! config.rs
//! Construction parameters for `MetaFileSink`.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_SEGMENT_SIZE, DEFAULT_RELATIVE_RATE, DEFAULT_SAMPLE_RATE};
use crate::headers::{RxTime, SampleType};
use crate::utils::split_seconds;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("item_size must be non-zero")]
    ZeroItemSize,

    #[error("item_size {have} does not fit the header field")]
    ItemSizeTooLarge { have: usize },

    #[error("max_segment_size must be non-zero")]
    ZeroSegmentSize,

    #[error("sample_rate must be finite and positive, got {have}")]
    InvalidSampleRate { have: f64 },

    #[error("relative_rate must be finite and positive, got {have}")]
    InvalidRelativeRate { have: f64 },

    #[error("start_time fraction {have} not in [0, 1)")]
    InvalidStartTime { have: f64 },

    #[error("config parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Bytes per record.
    pub item_size: usize,
    /// Upstream capture rate (records/s before `relative_rate`).
    /// Headers store `sample_rate * relative_rate` as `rx_rate`, also in the
    /// first header; GNU Radio's file_meta_sink writes the unscaled rate there.
    pub sample_rate: f64,
    /// Ratio between this writer's record rate and `sample_rate`.
    pub relative_rate: f64,
    pub sample_type: SampleType,
    pub is_complex: bool,
    /// Segment ceiling in records.
    pub max_segment_size: usize,
    /// Pre-encoded initial extra attributes (see `ExtraAttributes::encode`).
    pub extra_dict: Vec<u8>,
    /// Write headers to `<path>.hdr` instead of inline.
    pub split_header: bool,
    /// Flush after every batch.
    pub unbuffered: bool,
    /// Timestamp of the first record.
    pub start_time: RxTime,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            item_size: 1,
            sample_rate: DEFAULT_SAMPLE_RATE,
            relative_rate: DEFAULT_RELATIVE_RATE,
            sample_type: SampleType::Byte,
            is_complex: false,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            extra_dict: Vec::new(),
            split_header: false,
            unbuffered: false,
            start_time: RxTime::default(),
        }
    }
}

impl SinkConfig {
    pub fn new(item_size: usize, sample_rate: f64, max_segment_size: usize) -> Self {
        Self { item_size, sample_rate, max_segment_size, ..Default::default() }
    }

    pub fn with_relative_rate(mut self, relative_rate: f64) -> Self {
        self.relative_rate = relative_rate;
        self
    }

    pub fn with_sample_type(mut self, sample_type: SampleType, is_complex: bool) -> Self {
        self.sample_type = sample_type;
        self.is_complex = is_complex;
        self
    }

    pub fn with_extra_dict(mut self, extra_dict: Vec<u8>) -> Self {
        self.extra_dict = extra_dict;
        self
    }

    pub fn with_split_header(mut self, split: bool) -> Self {
        self.split_header = split;
        self
    }

    pub fn with_unbuffered(mut self, unbuffered: bool) -> Self {
        self.unbuffered = unbuffered;
        self
    }

    pub fn with_start_time(mut self, start: RxTime) -> Self {
        self.start_time = start;
        self
    }

    /// Seed `start_time` from the wall clock.
    pub fn start_time_now(mut self) -> Self {
        let now = chrono::Utc::now();
        let secs = now.timestamp().max(0) as u64;
        let (_, frac) = split_seconds(now.timestamp_subsec_nanos() as f64 / 1e9);
        self.start_time = RxTime::new(secs, frac);
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: SinkConfig = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.item_size == 0 {
            return Err(ConfigError::ZeroItemSize);
        }
        if self.item_size > u32::MAX as usize {
            return Err(ConfigError::ItemSizeTooLarge { have: self.item_size });
        }
        if self.max_segment_size == 0 {
            return Err(ConfigError::ZeroSegmentSize);
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate { have: self.sample_rate });
        }
        if !self.relative_rate.is_finite() || self.relative_rate <= 0.0 {
            return Err(ConfigError::InvalidRelativeRate { have: self.relative_rate });
        }
        if !(0.0..1.0).contains(&self.start_time.frac) {
            return Err(ConfigError::InvalidStartTime { have: self.start_time.frac });
        }
        Ok(())
    }

    /// Record rate seen by this writer.
    pub fn effective_rate(&self) -> f64 {
        self.sample_rate * self.relative_rate
    }
}
