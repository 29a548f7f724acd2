//! Header slots.
//!
//! Every emitted header remembers where it was written and how long its
//! region (fixed header + extras) was. Finalization rewrites exactly that
//! slot by absolute offset, never by seeking relative to the write cursor.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSlot {
    /// Absolute byte offset of the header in its channel.
    pub offset: u64,
    /// Length of header + extras as written.
    pub len: usize,
}

impl HeaderSlot {
    pub fn new(offset: u64, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.len as u64
    }

    /// Nothing has been written after this slot in a channel whose append
    /// cursor is `cursor`.
    pub fn is_tail(&self, cursor: u64) -> bool {
        self.end() == cursor
    }
}
