//! Segment header state and the emit/finalize protocol.
//!
//! Invariant: between `emit_new` and `finalize_current` of one header the
//! serialized extras keep their length, unless the header is still the tail
//! of its channel. The write loop guarantees this by finalizing before it
//! applies an update whenever the segment already holds data.

use tracing::debug;

use crate::config::SinkConfig;
use crate::constants::{HEADER_FIXED_SIZE, METADATA_VERSION};
use crate::headers::{
    encode_header_le, encode_meta_region, AttrValue, ExtraAttributes, HeaderError, HeaderField,
    HeaderFlags, SampleType, SegmentMeta,
};
use crate::sink::slot::HeaderSlot;
use crate::sink::target::OutputTarget;
use crate::timebase::TimeBase;
use crate::types::SinkError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributeError {
    #[error("'{key}' is maintained by the writer and cannot be set")]
    Reserved { key: String },

    #[error("'{key}' expects {expected}, got {got}")]
    TypeMismatch { key: String, expected: &'static str, got: &'static str },

    #[error("'{key}' value {value} out of range")]
    OutOfRange { key: String, value: String },
}

/// A validated update, ready to apply without further checks.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedUpdate {
    Version(u16),
    SampleRate(f64),
    RxTime(crate::headers::RxTime),
    ItemSize(u32),
    SampleType(SampleType),
    IsComplex(bool),
    Extra(String, AttrValue),
}

#[derive(Debug)]
pub struct SegmentHeaderManager {
    header: SegmentMeta,
    extras: ExtraAttributes,
    timebase: TimeBase,
    slot: Option<HeaderSlot>,
}

impl SegmentHeaderManager {
    /// Build the first header from `config`, merging its pre-encoded extras.
    /// Fails with a format error if the fixed header does not encode to
    /// exactly `HEADER_FIXED_SIZE` bytes.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let mut extras = ExtraAttributes::new();
        if !config.extra_dict.is_empty() {
            extras.merge(&ExtraAttributes::parse(&config.extra_dict)?);
        }

        let mut flags = HeaderFlags::empty();
        if config.split_header {
            flags |= HeaderFlags::DETACHED;
        }

        let item_size = u32::try_from(config.item_size)
            .map_err(|_| crate::config::ConfigError::ItemSizeTooLarge { have: config.item_size })?;

        let header = SegmentMeta {
            version: METADATA_VERSION,
            sample_type: config.sample_type,
            is_complex: config.is_complex,
            flags,
            item_size,
            sample_rate: config.effective_rate(),
            rx_time: config.start_time,
            segment_start_offset: (HEADER_FIXED_SIZE + extras.encoded_len()) as u64,
            segment_byte_length: 0,
        };

        let encoded = encode_header_le(&header)?;
        if encoded.len() != HEADER_FIXED_SIZE {
            return Err(HeaderError::FixedSizeMismatch { have: encoded.len(), need: HEADER_FIXED_SIZE }.into());
        }
        header.validate()?;

        let timebase = TimeBase::new(config.start_time, config.sample_rate, config.relative_rate);
        Ok(Self { header, extras, timebase, slot: None })
    }

    pub fn header(&self) -> &SegmentMeta {
        &self.header
    }

    pub fn extras(&self) -> &ExtraAttributes {
        &self.extras
    }

    /// Cached serialized extras length.
    pub fn extra_size(&self) -> usize {
        self.extras.encoded_len()
    }

    pub fn slot(&self) -> Option<HeaderSlot> {
        self.slot
    }

    /// True between `emit_new` and the `close_segment` that ends its segment.
    pub fn has_open_header(&self) -> bool {
        self.slot.is_some()
    }

    pub fn timebase(&self) -> &TimeBase {
        &self.timebase
    }

    /// Check `key = value` against the header schema without changing anything.
    pub fn prepare_update(&self, key: &str, value: AttrValue) -> Result<PreparedUpdate, AttributeError> {
        let field = match HeaderField::from_key(key) {
            Some(f) => f,
            None => return Ok(PreparedUpdate::Extra(key.to_owned(), value)),
        };

        let mismatch = |expected: &'static str| AttributeError::TypeMismatch {
            key: key.to_owned(),
            expected,
            got: value.type_name(),
        };
        let out_of_range = || AttributeError::OutOfRange { key: key.to_owned(), value: value.to_string() };

        match field {
            f if f.is_reserved() => Err(AttributeError::Reserved { key: key.to_owned() }),
            HeaderField::Version => {
                let v = value.as_u64().ok_or_else(|| mismatch("integer"))?;
                match u16::try_from(v) {
                    Ok(v) if v > 0 => Ok(PreparedUpdate::Version(v)),
                    _ => Err(out_of_range()),
                }
            }
            HeaderField::SampleRate => {
                let r = value.as_f64().ok_or_else(|| mismatch("number"))?;
                if r.is_finite() && r > 0.0 {
                    Ok(PreparedUpdate::SampleRate(r))
                } else {
                    Err(out_of_range())
                }
            }
            HeaderField::RxTime => value
                .as_rx_time()
                .map(PreparedUpdate::RxTime)
                .ok_or_else(|| mismatch("time")),
            HeaderField::ItemSize => {
                let v = value.as_u64().ok_or_else(|| mismatch("integer"))?;
                // Byte accounting follows the writer's record size.
                if v == self.header.item_size as u64 {
                    Ok(PreparedUpdate::ItemSize(v as u32))
                } else {
                    Err(out_of_range())
                }
            }
            HeaderField::SampleType => {
                let v = value.as_u64().ok_or_else(|| mismatch("integer"))?;
                u16::try_from(v)
                    .ok()
                    .and_then(|raw| SampleType::try_from(raw).ok())
                    .map(PreparedUpdate::SampleType)
                    .ok_or_else(out_of_range)
            }
            HeaderField::IsComplex => value
                .as_bool()
                .map(PreparedUpdate::IsComplex)
                .ok_or_else(|| mismatch("bool")),
            HeaderField::SegmentStart | HeaderField::SegmentBytes => {
                Err(AttributeError::Reserved { key: key.to_owned() })
            }
        }
    }

    /// Apply a validated update to the in-memory header or extras.
    pub fn apply(&mut self, update: PreparedUpdate) {
        match update {
            PreparedUpdate::Version(v) => self.header.version = v,
            PreparedUpdate::SampleRate(r) => {
                self.timebase.set_sample_rate(r);
                self.header.sample_rate = self.timebase.effective_rate();
            }
            PreparedUpdate::RxTime(t) => {
                self.timebase.set_time(t);
                self.header.rx_time = t;
            }
            PreparedUpdate::ItemSize(s) => self.header.item_size = s,
            PreparedUpdate::SampleType(t) => self.header.sample_type = t,
            PreparedUpdate::IsComplex(c) => self.header.is_complex = c,
            PreparedUpdate::Extra(k, v) => {
                self.extras.insert(k, v);
            }
        }
    }

    /// Validate and apply in one step.
    pub fn apply_attribute_update(&mut self, key: &str, value: AttrValue) -> Result<(), AttributeError> {
        let update = self.prepare_update(key, value)?;
        self.apply(update);
        Ok(())
    }

    fn refresh_offsets(&mut self, byte_length: u64) {
        self.header.segment_byte_length = byte_length;
        self.header.segment_start_offset = (HEADER_FIXED_SIZE + self.extras.encoded_len()) as u64;
    }

    /// Rewrite the open header slot with its final `byte_length`.
    /// Returns the old and new region lengths.
    pub fn finalize_current(&mut self, target: &mut OutputTarget, byte_length: u64) -> Result<(usize, usize), SinkError> {
        let slot = self
            .slot
            .ok_or_else(|| SinkError::Validation("no header has been emitted on this target".into()))?;

        self.refresh_offsets(byte_length);
        let region = encode_meta_region(&self.header, &self.extras)?;
        let rewritten = target.rewrite_header(&slot, &region)?;
        self.slot = Some(rewritten);

        debug!(
            offset = slot.offset,
            bytes = byte_length,
            strt = self.header.segment_start_offset,
            "finalized segment header"
        );
        Ok((slot.len, rewritten.len))
    }

    /// Write the current header as a fresh, open header at the cursor.
    pub fn emit_new(&mut self, target: &mut OutputTarget) -> Result<HeaderSlot, SinkError> {
        self.refresh_offsets(0);
        let region = encode_meta_region(&self.header, &self.extras)?;
        let slot = target.append_header(&region)?;
        self.slot = Some(slot);

        debug!(
            offset = slot.offset,
            len = slot.len,
            rx_time = %self.header.rx_time,
            "emitted segment header"
        );
        Ok(slot)
    }

    /// Move the time base forward by a closed segment's records.
    pub fn advance_time(&mut self, records: u64) {
        self.header.rx_time = self.timebase.advance(records);
    }

    /// Finalize the open header with `records` worth of data, then advance
    /// the time base so the next header starts where this segment ends.
    /// The slot is released: a closed header is never patched again.
    pub fn close_segment(&mut self, target: &mut OutputTarget, records: u64) -> Result<(usize, usize), SinkError> {
        let byte_length = records * self.header.item_size as u64;
        let lens = self.finalize_current(target, byte_length)?;
        self.advance_time(records);
        self.slot = None;
        Ok(lens)
    }

    /// Forget the open slot once its target is closed.
    pub fn release_slot(&mut self) {
        self.slot = None;
    }
}
