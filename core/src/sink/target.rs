//! Output target management.
//!
//! The writer owns one active target. Other threads stage replacements through
//! a `RotationHandle`: the new target is opened in the requester's context and
//! queued as a command, and the writer drains the queue only at batch
//! boundaries. The queue is the only state shared across threads.

use std::io::{self, Seek, SeekFrom, Write};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::headers::HeaderError;
use crate::sink::io::{open_channels, Destination, OutputChannel};
use crate::sink::slot::HeaderSlot;
use crate::types::SinkError;

/// Bytes stored before a data write failed.
#[derive(Debug)]
pub struct PartialWrite {
    pub written: usize,
    pub source: io::Error,
}

/// One or two open channels plus their append cursors.
pub struct OutputTarget {
    label: String,
    data: Box<dyn OutputChannel>,
    header: Option<Box<dyn OutputChannel>>,
    data_pos: u64,
    header_pos: u64,
}

impl std::fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputTarget")
            .field("label", &self.label)
            .field("split", &self.is_split())
            .field("data_pos", &self.data_pos)
            .field("header_pos", &self.header_pos)
            .finish()
    }
}

impl OutputTarget {
    /// Open `dest`; with `split` a dedicated header channel is opened too.
    pub fn open(dest: Destination, split: bool) -> Result<Self, SinkError> {
        let (label, data, header) = open_channels(dest, split)?;
        Ok(Self { label, data, header, data_pos: 0, header_pos: 0 })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_split(&self) -> bool {
        self.header.is_some()
    }

    /// Bytes appended to the data channel (headers included in combined mode).
    pub fn data_len(&self) -> u64 {
        self.data_pos
    }

    /// Append whole records of `record_len` bytes at the data cursor.
    ///
    /// On failure the channel is cut back to the last whole record, so
    /// `written` is always a multiple of `record_len`.
    pub fn write_data(&mut self, buf: &[u8], record_len: usize) -> Result<(), PartialWrite> {
        let mut off = 0;
        let result = loop {
            if off == buf.len() {
                break Ok(());
            }
            match self.data.write(&buf[off..]) {
                Ok(0) => {
                    break Err(io::Error::new(io::ErrorKind::WriteZero, "channel accepted zero bytes"));
                }
                Ok(k) => off += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        let Err(source) = result else {
            self.data_pos += off as u64;
            return Ok(());
        };

        let whole = off - off % record_len.max(1);
        let keep = self.data_pos + whole as u64;
        if whole != off {
            if let Err(e) = rewind(&mut *self.data, keep) {
                warn!(target_label = %self.label, at = keep, error = %e, "could not drop partial record");
                self.data_pos += off as u64;
                return Err(PartialWrite { written: whole, source });
            }
        }
        self.data_pos = keep;
        Err(PartialWrite { written: whole, source })
    }

    /// Append a header region at the header cursor and return its slot.
    pub fn append_header(&mut self, region: &[u8]) -> io::Result<HeaderSlot> {
        let (channel, cursor) = self.header_channel();
        if let Err(e) = channel.write_all(region) {
            // A torn header would sit where the next one is expected.
            rewind(&mut **channel, *cursor)?;
            return Err(e);
        }
        let slot = HeaderSlot::new(*cursor, region.len());
        *cursor += region.len() as u64;
        Ok(slot)
    }

    /// Overwrite `slot` with `region` and restore the append cursor.
    ///
    /// A region of a different length is accepted only when the slot is the
    /// tail of its channel; the cursor then moves to the new end.
    pub fn rewrite_header(&mut self, slot: &HeaderSlot, region: &[u8]) -> Result<HeaderSlot, SinkError> {
        let (channel, cursor) = self.header_channel();
        let tail = slot.is_tail(*cursor);

        if region.len() != slot.len && !tail {
            return Err(HeaderError::RegionResized {
                offset: slot.offset,
                have: slot.len,
                need: region.len(),
            }
            .into());
        }

        channel.seek(SeekFrom::Start(slot.offset))?;
        channel.write_all(region)?;

        let rewritten = HeaderSlot::new(slot.offset, region.len());
        if tail {
            if region.len() < slot.len {
                channel.truncate(rewritten.end())?;
            }
            *cursor = rewritten.end();
        } else {
            channel.seek(SeekFrom::Start(*cursor))?;
        }
        Ok(rewritten)
    }

    fn header_channel(&mut self) -> (&mut Box<dyn OutputChannel>, &mut u64) {
        match self.header.as_mut() {
            Some(h) => (h, &mut self.header_pos),
            None => (&mut self.data, &mut self.data_pos),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(h) = self.header.as_mut() {
            h.flush()?;
        }
        self.data.flush()
    }

    /// Flush and release both channels.
    pub fn close(mut self) -> io::Result<()> {
        self.flush()?;
        debug!(target_label = %self.label, data_bytes = self.data_pos, header_bytes = self.header_pos, "closed target");
        Ok(())
    }
}

/// Cut `channel` to `len` bytes and park the cursor there.
fn rewind(channel: &mut dyn OutputChannel, len: u64) -> io::Result<()> {
    channel.truncate(len)?;
    channel.seek(SeekFrom::Start(len))?;
    Ok(())
}

/// Command staged for the writer.
#[derive(Debug)]
pub enum TargetCommand {
    Install(OutputTarget),
    Detach,
}

/// Cloneable, `Send` handle for staging rotations from another thread.
#[derive(Debug, Clone)]
pub struct RotationHandle {
    tx: Sender<TargetCommand>,
    split: bool,
}

impl RotationHandle {
    /// Open `dest` now and queue it for installation at the next batch boundary.
    /// An open failure leaves the active target untouched.
    pub fn request_rotation(&self, dest: Destination) -> Result<(), SinkError> {
        let target = OutputTarget::open(dest, self.split)?;
        info!(target_label = %target.label(), "rotation requested");
        self.tx
            .send(TargetCommand::Install(target))
            .map_err(|_| SinkError::Validation("writer is gone".into()))
    }

    /// Queue closing the active target; later batches are dropped until a
    /// rotation installs a new one.
    pub fn request_close(&self) -> Result<(), SinkError> {
        info!("close requested");
        self.tx
            .send(TargetCommand::Detach)
            .map_err(|_| SinkError::Validation("writer is gone".into()))
    }
}

/// Active target plus the queue of staged commands.
#[derive(Debug)]
pub struct TargetManager {
    active: Option<OutputTarget>,
    tx: Sender<TargetCommand>,
    rx: Receiver<TargetCommand>,
    split: bool,
}

impl TargetManager {
    pub fn new(split: bool) -> Self {
        let (tx, rx) = channel::unbounded();
        Self { active: None, tx, rx, split }
    }

    pub fn handle(&self) -> RotationHandle {
        RotationHandle { tx: self.tx.clone(), split: self.split }
    }

    pub fn is_split(&self) -> bool {
        self.split
    }

    pub fn active(&self) -> Option<&OutputTarget> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut OutputTarget> {
        self.active.as_mut()
    }

    pub fn take_active(&mut self) -> Option<OutputTarget> {
        self.active.take()
    }

    pub fn set_active(&mut self, target: OutputTarget) {
        self.active = Some(target);
    }

    /// Drain staged commands; the last one wins. Superseded targets are closed.
    pub fn take_pending(&mut self) -> Option<TargetCommand> {
        let mut last: Option<TargetCommand> = None;
        loop {
            match self.rx.try_recv() {
                Ok(cmd) => {
                    if let Some(TargetCommand::Install(stale)) = last.replace(cmd) {
                        close_quietly(stale);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        last
    }

    /// Close every staged target without installing it.
    pub fn close_pending(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            if let TargetCommand::Install(t) = cmd {
                close_quietly(t);
            }
        }
    }
}

pub(crate) fn close_quietly(target: OutputTarget) {
    let label = target.label().to_owned();
    if let Err(e) = target.close() {
        warn!(target_label = %label, error = %e, "failed to close target");
    }
}
