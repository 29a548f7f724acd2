//! src/headers/encode.rs
//!
//! Header encoding utilities.
//!
//! Design notes:
//! - Serializes `SegmentMeta` into a fixed 64-byte buffer in little-endian order.
//! - Field order must match `decode.rs` exactly.
//! - The length check is the format invariant that makes in-place header
//!   rewrites possible; a mismatch is a programming error surfaced as
//!   `HeaderError::FixedSizeMismatch`.

use std::io;

use byteorder::{LittleEndian, WriteBytesExt};
use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{HEADER_CRC_SPAN, HEADER_FIXED_SIZE, MAGIC_SGMH};
use crate::headers::extras::ExtraAttributes;
use crate::headers::types::{HeaderError, SegmentMeta};
use crate::utils::compute_crc32;

/// Serialize a `SegmentMeta` into its fixed-size wire form.
///
/// Layout:
///
/// ```text
/// [ magic        (4) ]
/// [ version      (2) ]
/// [ sample_type  (2) ]
/// [ is_complex   (1) ]
/// [ flags        (1) ]
/// [ reserved     (2) ]
/// [ item_size    (4) ]
/// [ sample_rate  (8) ]
/// [ rx_secs      (8) ]
/// [ rx_frac      (8) ]
/// [ strt         (8) ]
/// [ bytes        (8) ]
/// [ crc32        (4) ]  over the 56 bytes above
/// [ reserved     (4) ]
/// ```
pub fn encode_header_le(h: &SegmentMeta) -> Result<[u8; HEADER_FIXED_SIZE], HeaderError> {
    let mut wire = Vec::with_capacity(HEADER_FIXED_SIZE);

    write_fields(&mut wire, h).map_err(|_| HeaderError::FixedSizeMismatch {
        have: wire.len(),
        need: HEADER_FIXED_SIZE,
    })?;

    if wire.len() != HEADER_FIXED_SIZE {
        return Err(HeaderError::FixedSizeMismatch {
            have: wire.len(),
            need: HEADER_FIXED_SIZE,
        });
    }

    let mut out = [0u8; HEADER_FIXED_SIZE];
    out.copy_from_slice(&wire);
    Ok(out)
}

fn write_fields(wire: &mut Vec<u8>, h: &SegmentMeta) -> io::Result<()> {
    wire.extend_from_slice(&MAGIC_SGMH);                   // 0..4
    wire.write_u16::<LittleEndian>(h.version)?;            // 4..6
    wire.write_u16::<LittleEndian>(h.sample_type as u16)?; // 6..8
    wire.write_u8(h.is_complex as u8)?;                    // 8
    wire.write_u8(h.flags.bits())?;                        // 9
    wire.write_u16::<LittleEndian>(0)?;                    // 10..12 reserved
    wire.write_u32::<LittleEndian>(h.item_size)?;          // 12..16
    wire.write_f64::<LittleEndian>(h.sample_rate)?;        // 16..24
    wire.write_u64::<LittleEndian>(h.rx_time.secs)?;       // 24..32
    wire.write_f64::<LittleEndian>(h.rx_time.frac)?;       // 32..40
    wire.write_u64::<LittleEndian>(h.segment_start_offset)?; // 40..48
    wire.write_u64::<LittleEndian>(h.segment_byte_length)?;  // 48..56

    debug_assert_eq!(wire.len(), HEADER_CRC_SPAN);
    let crc = compute_crc32(&wire[..HEADER_CRC_SPAN]);
    wire.write_u32::<LittleEndian>(crc)?;                  // 56..60
    wire.write_u32::<LittleEndian>(0)?;                    // 60..64 reserved
    Ok(())
}

/// Encode header ++ extras: the unit written into a header slot.
pub fn encode_meta_region(h: &SegmentMeta, extras: &ExtraAttributes) -> Result<Bytes, HeaderError> {
    let fixed = encode_header_le(h)?;
    let extra = extras.encode()?;

    let mut region = BytesMut::with_capacity(fixed.len() + extra.len());
    region.put_slice(&fixed);
    region.put_slice(&extra);
    Ok(region.freeze())
}
