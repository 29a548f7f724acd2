//! headers/mod.rs
//! Metadata codec: fixed-size segment headers plus variable extra attributes.
//!
//! Notes:
//! - Fixed header (64 bytes) keeps in-place rewrites length-preserving.
//! - Extras follow each header; their length is recorded in `strt`.
//! - Little-endian for every multi-byte field.

pub mod types;
pub mod encode;
pub mod decode;
pub mod extras;

pub use types::*;
pub use encode::*;
pub use decode::*;
pub use extras::*;
