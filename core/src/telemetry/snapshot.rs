//! telemetry/snapshot.rs
//! Immutable view over counters and stage timers.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::telemetry::counters::SinkCounters;
use crate::telemetry::timers::{StageTimes, TelemetryTimer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkSnapshot {
    pub batches: u64,
    pub headers_emitted: u64,
    pub headers_finalized: u64,
    pub segments_closed: u64,
    pub records_written: u64,
    pub records_dropped: u64,
    pub bytes_data: u64,
    pub bytes_header: u64,
    pub tags_applied: u64,
    pub tags_rejected: u64,
    pub rotations: u64,
    pub overhead_ratio: f64,
    pub throughput_bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
}

impl SinkSnapshot {
    pub fn from(counters: &SinkCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();

        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_data as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            batches: counters.batches,
            headers_emitted: counters.headers_emitted,
            headers_finalized: counters.headers_finalized,
            segments_closed: counters.segments_closed,
            records_written: counters.records_written,
            records_dropped: counters.records_dropped,
            bytes_data: counters.bytes_data,
            bytes_header: counters.bytes_header,
            tags_applied: counters.tags_applied,
            tags_rejected: counters.tags_rejected,
            rotations: counters.rotations,
            overhead_ratio: counters.overhead_ratio(),
            throughput_bytes_per_sec: throughput,
            elapsed,
            stage_times: timer.stage_times.clone(),
        }
    }

    pub fn total_stage_time(&self) -> Duration {
        self.stage_times.total()
    }

    /// Internal consistency:
    /// - every closed segment had its header emitted and finalized
    /// - stage times never exceed wall time
    pub fn sanity_check(&self) -> bool {
        self.headers_finalized >= self.segments_closed
            && self.segments_closed <= self.headers_emitted
            && self.total_stage_time() <= self.elapsed
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
