//! headers/types.rs
//! Segment header struct, its typed fields, and codec errors.
//!
//! Notes:
//! - Every field has a fixed-width wire form so that re-encoding a header with
//!   different values never changes its length. In-place rewrites depend on it.
//! - Little-endian throughout; reserved bytes are always zero.

use std::fmt;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::constants::{keys, HEADER_FIXED_SIZE, METADATA_VERSION};
use crate::utils::{enum_name_or_hex, fmt_bytes};

/// Kind of scalar stored in each record.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum SampleType {
    Byte     = 0,
    Short    = 1,
    Int      = 2,
    Long     = 3,
    LongLong = 4,
    Float    = 5,
    Double   = 6,
}

impl SampleType {
    pub fn verify(raw: u16) -> Result<(), HeaderError> {
        SampleType::try_from_primitive(raw)
            .map(|_| ())
            .map_err(|_| HeaderError::UnknownSampleType { raw })
    }
}

impl Default for SampleType {
    fn default() -> Self {
        SampleType::Byte
    }
}

bitflags::bitflags! {
    /// Header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u8 {
        /// Header lives in a dedicated header channel, data elsewhere.
        const DETACHED = 0b0000_0001;
    }
}

/// Stream timestamp: whole seconds plus a fraction in `[0, 1)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RxTime {
    pub secs: u64,
    pub frac: f64,
}

impl RxTime {
    pub fn new(secs: u64, frac: f64) -> Self {
        Self { secs, frac }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.frac
    }
}

impl fmt::Display for RxTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{:.9}s", self.secs, self.frac)
    }
}

/// Fixed fields addressable by attribute key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaderField {
    Version,
    SampleRate,
    RxTime,
    ItemSize,
    SampleType,
    IsComplex,
    SegmentStart,
    SegmentBytes,
}

impl HeaderField {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            keys::VERSION => Some(HeaderField::Version),
            keys::RX_RATE => Some(HeaderField::SampleRate),
            keys::RX_TIME => Some(HeaderField::RxTime),
            keys::SIZE    => Some(HeaderField::ItemSize),
            keys::TYPE    => Some(HeaderField::SampleType),
            keys::CPLX    => Some(HeaderField::IsComplex),
            keys::STRT    => Some(HeaderField::SegmentStart),
            keys::BYTES   => Some(HeaderField::SegmentBytes),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            HeaderField::Version      => keys::VERSION,
            HeaderField::SampleRate   => keys::RX_RATE,
            HeaderField::RxTime       => keys::RX_TIME,
            HeaderField::ItemSize     => keys::SIZE,
            HeaderField::SampleType   => keys::TYPE,
            HeaderField::IsComplex    => keys::CPLX,
            HeaderField::SegmentStart => keys::STRT,
            HeaderField::SegmentBytes => keys::BYTES,
        }
    }

    /// Fields the writer owns; callers may not set them.
    pub fn is_reserved(self) -> bool {
        matches!(self, HeaderField::SegmentStart | HeaderField::SegmentBytes)
    }
}

/// One segment header.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMeta {
    pub version: u16,
    pub sample_type: SampleType,
    pub is_complex: bool,
    pub flags: HeaderFlags,
    pub item_size: u32,
    pub sample_rate: f64,
    pub rx_time: RxTime,
    /// `strt`: bytes from this header's first byte to its segment's first data byte.
    pub segment_start_offset: u64,
    /// `bytes`: data bytes in this segment; 0 until finalized.
    pub segment_byte_length: u64,
}

impl Default for SegmentMeta {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION,
            sample_type: SampleType::Byte,
            is_complex: false,
            flags: HeaderFlags::empty(),
            item_size: 1,
            sample_rate: 1.0,
            rx_time: RxTime::default(),
            segment_start_offset: HEADER_FIXED_SIZE as u64,
            segment_byte_length: 0,
        }
    }
}

impl SegmentMeta {
    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.item_size == 0 {
            return Err(HeaderError::InvalidItemSize);
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(HeaderError::InvalidSampleRate { have: self.sample_rate });
        }
        if !(0.0..1.0).contains(&self.rx_time.frac) {
            return Err(HeaderError::InvalidFraction { have: self.rx_time.frac });
        }
        if self.segment_start_offset < HEADER_FIXED_SIZE as u64 {
            return Err(HeaderError::InvalidSegmentStart { have: self.segment_start_offset });
        }
        Ok(())
    }

    /// Number of records described by `segment_byte_length`.
    pub fn record_count(&self) -> u64 {
        self.segment_byte_length / self.item_size.max(1) as u64
    }

    pub fn is_detached(&self) -> bool {
        self.flags.contains(HeaderFlags::DETACHED)
    }

    pub fn summary(&self) -> String {
        format!(
            "SegmentMeta {{ version: {}, type: {:?}, cplx: {}, size: {}, rate: {}, \
             rx_time: {}, strt: {}, bytes: {} }}",
            self.version,
            self.sample_type,
            self.is_complex,
            self.item_size,
            self.sample_rate,
            self.rx_time,
            self.segment_start_offset,
            self.segment_byte_length,
        )
    }
}

fn sample_type_name(raw: &u16) -> String {
    enum_name_or_hex::<SampleType>(*raw)
}

#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("header buffer too short: {have} < {need}")]
    BufferTooShort { have: usize, need: usize },

    #[error("invalid magic: expected {}, got {}", fmt_bytes(.need), fmt_bytes(.have))]
    InvalidMagic { have: [u8; 4], need: [u8; 4] },

    #[error("invalid version: {have}")]
    InvalidVersion { have: u16 },

    #[error("unknown sample type: {}", sample_type_name(.raw))]
    UnknownSampleType { raw: u16 },

    #[error("unknown header flags: 0x{raw:02x}")]
    InvalidFlags { raw: u8 },

    #[error("reserved bytes must be zero, got {}", fmt_bytes(.reserved))]
    ReservedBytesNonZero { reserved: Vec<u8> },

    #[error("header crc mismatch: stored 0x{have:08x}, computed 0x{need:08x}")]
    InvalidCrc32 { have: u32, need: u32 },

    #[error("invalid item size: zero")]
    InvalidItemSize,

    #[error("invalid sample rate: {have}")]
    InvalidSampleRate { have: f64 },

    #[error("invalid rx_time fraction: {have} not in [0, 1)")]
    InvalidFraction { have: f64 },

    #[error("invalid segment start offset: {have}")]
    InvalidSegmentStart { have: u64 },

    /// Encoded fixed portion is not `HEADER_FIXED_SIZE` bytes.
    #[error("fixed header encoded to {have} bytes, format requires {need}")]
    FixedSizeMismatch { have: usize, need: usize },

    /// A header region would change length while data already follows it.
    #[error("header region at offset {offset} would change from {have} to {need} bytes")]
    RegionResized { offset: u64, have: usize, need: usize },

    #[error("extra attributes encode failed: {0}")]
    ExtraEncode(String),

    #[error("extra attributes decode failed: {0}")]
    ExtraDecode(String),

    #[error("extra attributes blob has {extra} trailing bytes")]
    TrailingBytes { extra: usize },
}
