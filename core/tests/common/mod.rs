//! Shared helpers: record generators and stream walkers that re-parse what
//! the writer produced.

#![allow(dead_code)]

use metasink_core::constants::HEADER_FIXED_SIZE;
use metasink_core::headers::{decode_header_le, ExtraAttributes, SegmentMeta};
use metasink_core::prelude::*;

/// One parsed segment: its header, extras and data bytes.
#[derive(Debug, Clone)]
pub struct Segment {
    pub meta: SegmentMeta,
    pub extras: ExtraAttributes,
    pub data: Vec<u8>,
}

/// `n` records of `item_size` bytes with a recognizable byte pattern.
pub fn records(n: usize, item_size: usize) -> Vec<u8> {
    (0..n * item_size).map(|i| (i % 251) as u8).collect()
}

/// Writer over a fresh in-memory destination.
pub fn memory_sink(config: SinkConfig) -> (MetaFileSink, MemorySink) {
    let mem = MemorySink::new();
    let sink = MetaFileSink::new(config, Destination::Memory(mem.clone())).expect("open sink");
    (sink, mem)
}

/// `item_size = 4`, `sample_rate = 1000`, combined mode.
pub fn basic_config(max_segment_size: usize) -> SinkConfig {
    SinkConfig::new(4, 1000.0, max_segment_size)
}

/// Walk a combined stream: `[h][x][d][h][x][d]...`.
pub fn walk_combined(buf: &[u8]) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        let meta = decode_header_le(&buf[pos..]).expect("decode header");
        let strt = meta.segment_start_offset as usize;
        let extras = ExtraAttributes::parse(&buf[pos + HEADER_FIXED_SIZE..pos + strt]).expect("parse extras");
        let start = pos + strt;
        let end = start + meta.segment_byte_length as usize;
        assert!(end <= buf.len(), "segment runs past end of stream");
        out.push(Segment { meta, extras, data: buf[start..end].to_vec() });
        pos = end;
    }
    out
}

/// Walk a split stream: header channel `[h][x][h][x]...` plus raw data.
pub fn walk_split(headers: &[u8], data: &[u8]) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    let mut dpos = 0usize;
    while pos < headers.len() {
        let meta = decode_header_le(&headers[pos..]).expect("decode header");
        let strt = meta.segment_start_offset as usize;
        let extras = ExtraAttributes::parse(&headers[pos + HEADER_FIXED_SIZE..pos + strt]).expect("parse extras");
        let dend = dpos + meta.segment_byte_length as usize;
        assert!(dend <= data.len(), "segment runs past end of data");
        out.push(Segment { meta, extras, data: data[dpos..dend].to_vec() });
        pos += strt;
        dpos = dend;
    }
    assert_eq!(dpos, data.len(), "data not fully covered by headers");
    out
}

pub fn byte_lengths(segs: &[Segment]) -> Vec<u64> {
    segs.iter().map(|s| s.meta.segment_byte_length).collect()
}

pub fn concat_data(segs: &[Segment]) -> Vec<u8> {
    segs.iter().flat_map(|s| s.data.iter().copied()).collect()
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
