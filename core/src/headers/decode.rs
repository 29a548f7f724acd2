//! src/headers/decode.rs
//!
//! Header decoding utilities.
//!
//! Design notes:
//! - Deserializes the fixed 64-byte buffer back into a `SegmentMeta`.
//! - Field order must match `encode.rs` exactly.
//! - CRC, magic, enum and reserved-byte checks run before the struct is built.

use byteorder::{ByteOrder, LittleEndian};

use crate::constants::{HEADER_CRC_SPAN, HEADER_FIXED_SIZE, MAGIC_SGMH};
use crate::headers::types::{HeaderError, HeaderFlags, RxTime, SampleType, SegmentMeta};
use crate::utils::compute_crc32;

/// Deserialize a little-endian header from the first `HEADER_FIXED_SIZE` bytes of `buf`.
pub fn decode_header_le(buf: &[u8]) -> Result<SegmentMeta, HeaderError> {
    if buf.len() < HEADER_FIXED_SIZE {
        return Err(HeaderError::BufferTooShort { have: buf.len(), need: HEADER_FIXED_SIZE });
    }
    let buf = &buf[..HEADER_FIXED_SIZE];

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&buf[0..4]);
    if magic != MAGIC_SGMH {
        return Err(HeaderError::InvalidMagic { have: magic, need: MAGIC_SGMH });
    }

    let stored_crc = LittleEndian::read_u32(&buf[56..60]);
    let computed_crc = compute_crc32(&buf[..HEADER_CRC_SPAN]);
    if stored_crc != computed_crc {
        return Err(HeaderError::InvalidCrc32 { have: stored_crc, need: computed_crc });
    }

    if buf[10..12].iter().chain(&buf[60..64]).any(|&b| b != 0) {
        let reserved = buf[10..12].iter().chain(&buf[60..64]).copied().collect();
        return Err(HeaderError::ReservedBytesNonZero { reserved });
    }

    let version = LittleEndian::read_u16(&buf[4..6]);
    if version == 0 {
        return Err(HeaderError::InvalidVersion { have: version });
    }

    let raw_type = LittleEndian::read_u16(&buf[6..8]);
    let sample_type = SampleType::try_from(raw_type)
        .map_err(|_| HeaderError::UnknownSampleType { raw: raw_type })?;

    let flags = HeaderFlags::from_bits(buf[9])
        .ok_or(HeaderError::InvalidFlags { raw: buf[9] })?;

    let h = SegmentMeta {
        version,
        sample_type,
        is_complex: buf[8] != 0,
        flags,
        item_size: LittleEndian::read_u32(&buf[12..16]),
        sample_rate: LittleEndian::read_f64(&buf[16..24]),
        rx_time: RxTime {
            secs: LittleEndian::read_u64(&buf[24..32]),
            frac: LittleEndian::read_f64(&buf[32..40]),
        },
        segment_start_offset: LittleEndian::read_u64(&buf[40..48]),
        segment_byte_length: LittleEndian::read_u64(&buf[48..56]),
    };

    h.validate()?;
    Ok(h)
}
