//! telemetry/counters.rs
//! Mutable counters updated by the writer.
//!
//! Summary: counts headers, segments, records and bytes as batches are written.
//! Converted into an immutable `SinkSnapshot` on demand.
use bincode::{Decode, Encode};
use std::ops::AddAssign;

/// Deterministic counters collected while writing
#[derive(Default, Clone, Debug, Encode, Decode, PartialEq)]
pub struct SinkCounters {
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
}

impl SinkCounters {
    /// Record one freshly emitted header region.
    pub fn add_header(&mut self, region_len: usize) {
        self.headers_emitted += 1;
        self.bytes_header += region_len as u64;
    }

    /// Record an in-place rewrite. Only a tail resize changes the byte total.
    pub fn add_finalize(&mut self, old_len: usize, new_len: usize) {
        self.headers_finalized += 1;
        self.bytes_header = (self.bytes_header + new_len as u64).saturating_sub(old_len as u64);
    }

    pub fn add_data(&mut self, records: usize, item_size: usize) {
        self.records_written += records as u64;
        self.bytes_data += (records * item_size) as u64;
    }

    pub fn add_dropped(&mut self, records: usize) {
        self.records_dropped += records as u64;
    }

    pub fn add_segment(&mut self) {
        self.segments_closed += 1;
    }

    pub fn add_tag(&mut self, accepted: bool) {
        if accepted {
            self.tags_applied += 1;
        } else {
            self.tags_rejected += 1;
        }
    }

    pub fn add_rotation(&mut self) {
        self.rotations += 1;
    }

    /// Bytes of metadata relative to data bytes.
    pub fn overhead_ratio(&self) -> f64 {
        if self.bytes_data == 0 {
            0.0
        } else {
            self.bytes_header as f64 / self.bytes_data as f64
        }
    }

    pub fn merge(&mut self, other: &SinkCounters) {
        *self += other.clone();
    }
}

impl AddAssign for SinkCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.batches           += rhs.batches;
        self.headers_emitted   += rhs.headers_emitted;
        self.headers_finalized += rhs.headers_finalized;
        self.segments_closed   += rhs.segments_closed;
        self.records_written   += rhs.records_written;
        self.records_dropped   += rhs.records_dropped;
        self.bytes_data        += rhs.bytes_data;
        self.bytes_header      += rhs.bytes_header;
        self.tags_applied      += rhs.tags_applied;
        self.tags_rejected     += rhs.tags_rejected;
        self.rotations         += rhs.rotations;
    }
}
