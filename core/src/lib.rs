//! metasink-core
//!
//! Segmented, self-describing stream writer: fixed-size records interleaved
//! with patchable metadata headers.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;
pub mod config;

// Codec and time base
pub mod headers;
pub mod timebase;
pub mod telemetry;

// Writer
pub mod sink;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::config::{ConfigError, SinkConfig};
    pub use crate::headers::{
        decode_header_le, encode_header_le, AttrValue, ExtraAttributes, HeaderError, RxTime,
        SampleType, SegmentMeta,
    };
    pub use crate::sink::{AttributeError, Destination, MemorySink, MetaFileSink, RotationHandle, Tag};
    pub use crate::telemetry::{SinkCounters, SinkSnapshot};
    pub use crate::types::SinkError;
}
