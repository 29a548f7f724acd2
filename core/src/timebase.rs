//! timebase.rs
//! Elapsed-time tracker for segment timestamps.
//!
//! `rx_time` is always recomputed as `anchor + records / rate` from an exact
//! record count, so closing many short segments lands on the same timestamp
//! as closing one long one. Setting the time or the rate re-anchors.

use crate::headers::RxTime;
use crate::utils::split_seconds;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBase {
    anchor: RxTime,
    sample_rate: f64,
    relative_rate: f64,
    records_since_anchor: u64,
    current: RxTime,
}

impl TimeBase {
    pub fn new(start: RxTime, sample_rate: f64, relative_rate: f64) -> Self {
        Self {
            anchor: start,
            sample_rate,
            relative_rate,
            records_since_anchor: 0,
            current: start,
        }
    }

    /// Rate at which records arrive at this writer.
    pub fn effective_rate(&self) -> f64 {
        self.sample_rate * self.relative_rate
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn now(&self) -> RxTime {
        self.current
    }

    /// Account for `records` more records and return the new timestamp.
    pub fn advance(&mut self, records: u64) -> RxTime {
        if records == 0 {
            return self.current;
        }
        self.records_since_anchor += records;

        let elapsed = self.records_since_anchor as f64 / self.effective_rate();
        let (carry, frac) = split_seconds(self.anchor.frac + elapsed);
        self.current = RxTime::new(self.anchor.secs + carry, frac);
        self.current
    }

    /// Jump to an externally supplied time (e.g. an `rx_time` tag).
    pub fn set_time(&mut self, t: RxTime) {
        self.anchor = t;
        self.current = t;
        self.records_since_anchor = 0;
    }

    /// Switch to a new upstream sample rate from the current position.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.anchor = self.current;
        self.records_since_anchor = 0;
        self.sample_rate = sample_rate;
    }
}
