//! sink/write_loop.rs
//! Per-batch state machine that interleaves record writes with segment
//! boundaries.
//!
//! A batch is cut at two kinds of boundary:
//! - the segment ceiling (`max_segment_size` records), and
//! - tag offsets, where an attribute update takes effect.
//!
//! Several tags at one offset collapse into a single header: the first one
//! closes the running segment, later ones patch the still-empty header.
//! A full segment is rolled only once more records arrive for it, so a batch
//! never leaves an empty trailing header behind. The same holds after a
//! failed emit: the closed segment stays closed and the next record emits
//! its header.

use std::time::Instant;

use tracing::{debug, warn};

use crate::headers::AttrValue;
use crate::sink::header_manager::{PreparedUpdate, SegmentHeaderManager};
use crate::sink::target::OutputTarget;
use crate::telemetry::{SinkCounters, Stage, TelemetryTimer};
use crate::types::SinkError;

/// Attribute update attached to an absolute record offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub offset: u64,
    pub key: String,
    pub value: AttrValue,
}

impl Tag {
    pub fn new(offset: u64, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self { offset, key: key.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    WritingSegment,
    AtTagBoundary,
    SegmentFull,
}

/// Borrowed view of the writer state one batch needs.
pub(crate) struct SegmentWriter<'a> {
    pub headers: &'a mut SegmentHeaderManager,
    pub target: &'a mut OutputTarget,
    pub counters: &'a mut SinkCounters,
    pub timer: &'a mut TelemetryTimer,
    pub seg_records: &'a mut u64,
    pub max_segment_size: u64,
    pub item_size: usize,
}

impl<'a> SegmentWriter<'a> {
    /// Append whole records. On failure the records that fully reached the
    /// channel still count towards the segment; the count is returned.
    fn write_records(&mut self, buf: &[u8]) -> Result<(), (u64, std::io::Error)> {
        let t = Instant::now();
        let result = self.target.write_data(buf, self.item_size);
        self.timer.add_stage_time(Stage::Write, t.elapsed());

        match result {
            Ok(()) => {
                let records = buf.len() / self.item_size;
                *self.seg_records += records as u64;
                self.counters.add_data(records, self.item_size);
                Ok(())
            }
            Err(partial) => {
                let records = partial.written / self.item_size;
                *self.seg_records += records as u64;
                self.counters.add_data(records, self.item_size);
                Err((records as u64, partial.source))
            }
        }
    }

    /// Finalize the running header with the segment's byte length.
    pub fn close_segment(&mut self) -> Result<(), SinkError> {
        let t = Instant::now();
        let (old, new) = self.headers.close_segment(self.target, *self.seg_records)?;
        self.timer.add_stage_time(Stage::Finalize, t.elapsed());

        *self.seg_records = 0;
        self.counters.add_finalize(old, new);
        self.counters.add_segment();
        Ok(())
    }

    /// Emit a fresh header at the cursor and start counting from zero.
    pub fn open_segment(&mut self) -> Result<(), SinkError> {
        let t = Instant::now();
        let slot = self.headers.emit_new(self.target)?;
        self.timer.add_stage_time(Stage::Emit, t.elapsed());

        self.counters.add_header(slot.len);
        *self.seg_records = 0;
        Ok(())
    }

    /// Close the running segment if one is open, then emit the next header.
    fn roll_segment(&mut self) -> Result<(), SinkError> {
        if self.headers.has_open_header() {
            self.close_segment()?;
        }
        self.open_segment()
    }

    /// Validate a tag. A rejected tag is logged and counted; its boundary still happens.
    fn prepare_tag(&mut self, tag: &Tag) -> Option<PreparedUpdate> {
        match self.headers.prepare_update(&tag.key, tag.value.clone()) {
            Ok(update) => {
                self.counters.add_tag(true);
                Some(update)
            }
            Err(e) => {
                warn!(offset = tag.offset, key = %tag.key, error = %e, "tag rejected");
                self.counters.add_tag(false);
                None
            }
        }
    }

    /// Segment boundary carrying an optional header update.
    ///
    /// With data in the running segment: close it, apply, open a new one.
    /// With no open header: apply and emit.
    /// With an empty segment: apply and rewrite the open header in place.
    pub fn boundary(&mut self, update: Option<PreparedUpdate>) -> Result<(), SinkError> {
        if *self.seg_records > 0 {
            self.close_segment()?;
            if let Some(u) = update {
                self.headers.apply(u);
            }
            self.open_segment()
        } else if !self.headers.has_open_header() {
            if let Some(u) = update {
                self.headers.apply(u);
            }
            self.open_segment()
        } else {
            if let Some(u) = update {
                self.headers.apply(u);
            }
            let t = Instant::now();
            let (old, new) = self.headers.finalize_current(self.target, 0)?;
            self.timer.add_stage_time(Stage::Finalize, t.elapsed());
            self.counters.add_finalize(old, new);
            Ok(())
        }
    }

    /// Write `n` records from `items`, cutting at `tags` (batch-relative,
    /// sorted). Returns the number of records persisted.
    pub fn run_batch(&mut self, items: &[u8], tags: &[(u64, &Tag)]) -> Result<usize, SinkError> {
        let n = (items.len() / self.item_size) as u64;
        let mut written: u64 = 0;
        let mut next_tag = 0usize;
        let mut state = LoopState::WritingSegment;

        loop {
            state = match state {
                LoopState::WritingSegment => {
                    let stop = tags.get(next_tag).map_or(n, |(rel, _)| *rel);
                    let room = self.max_segment_size.saturating_sub(*self.seg_records);

                    if written == stop {
                        if next_tag < tags.len() {
                            LoopState::AtTagBoundary
                        } else {
                            break;
                        }
                    } else if room == 0 || !self.headers.has_open_header() {
                        LoopState::SegmentFull
                    } else {
                        let chunk = room.min(stop - written);
                        let from = written as usize * self.item_size;
                        let to = (written + chunk) as usize * self.item_size;
                        if let Err((records, source)) = self.write_records(&items[from..to]) {
                            return Err(SinkError::Write { persisted: (written + records) as usize, source });
                        }
                        written += chunk;
                        LoopState::WritingSegment
                    }
                }
                LoopState::SegmentFull => {
                    debug!(records = *self.seg_records, "segment full");
                    self.roll_segment().map_err(|e| with_persisted(e, written))?;
                    LoopState::WritingSegment
                }
                LoopState::AtTagBoundary => {
                    let (_, tag) = tags[next_tag];
                    next_tag += 1;
                    let update = self.prepare_tag(tag);
                    self.boundary(update).map_err(|e| with_persisted(e, written))?;
                    LoopState::WritingSegment
                }
            };
        }

        Ok(written as usize)
    }
}

/// Plain I/O failures inside a batch report how far the batch got.
fn with_persisted(err: SinkError, written: u64) -> SinkError {
    match err {
        SinkError::Io(source) => SinkError::Write { persisted: written as usize, source },
        other => other,
    }
}
