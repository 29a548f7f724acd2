// ## 📦 `sink/core.rs`

//! The writer facade: owns header state, the active target and telemetry,
//! and drives one batch at a time.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::SinkConfig;
use crate::headers::{AttrValue, ExtraAttributes, SegmentMeta};
use crate::sink::header_manager::SegmentHeaderManager;
use crate::sink::io::Destination;
use crate::sink::target::{close_quietly, OutputTarget, RotationHandle, TargetCommand, TargetManager};
use crate::sink::write_loop::{SegmentWriter, Tag};
use crate::telemetry::{SinkCounters, SinkSnapshot, Stage, TelemetryTimer};
use crate::types::SinkError;

#[derive(Debug)]
pub struct MetaFileSink {
    config: SinkConfig,
    headers: SegmentHeaderManager,
    targets: TargetManager,
    counters: SinkCounters,
    timer: TelemetryTimer,
    seg_records: u64,
    items_read: u64,
    unbuffered: bool,
    dropping: bool,
    closed: bool,
}

impl MetaFileSink {
    /// Validate `config`, open `destination` and write the first header.
    pub fn new(config: SinkConfig, destination: Destination) -> Result<Self, SinkError> {
        config.validate()?;
        let mut headers = SegmentHeaderManager::new(&config)?;
        let mut targets = TargetManager::new(config.split_header);
        let mut counters = SinkCounters::default();
        let mut timer = TelemetryTimer::new();

        let mut target = OutputTarget::open(destination, config.split_header)?;
        let slot = timer.time(Stage::Emit, || headers.emit_new(&mut target))?;
        counters.add_header(slot.len);

        info!(
            target_label = %target.label(),
            item_size = config.item_size,
            max_segment_size = config.max_segment_size,
            split = config.split_header,
            "meta sink opened"
        );
        targets.set_active(target);

        Ok(Self {
            unbuffered: config.unbuffered,
            config,
            headers,
            targets,
            counters,
            timer,
            seg_records: 0,
            items_read: 0,
            dropping: false,
            closed: false,
        })
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Header fields the next finalize or emit will write.
    pub fn header(&self) -> &SegmentMeta {
        self.headers.header()
    }

    pub fn extras(&self) -> &ExtraAttributes {
        self.headers.extras()
    }

    /// Absolute index of the first record of the next batch.
    pub fn items_read(&self) -> u64 {
        self.items_read
    }

    pub fn is_active(&self) -> bool {
        self.targets.active().is_some()
    }

    pub fn counters(&self) -> &SinkCounters {
        &self.counters
    }

    pub fn snapshot(&self) -> SinkSnapshot {
        SinkSnapshot::from(&self.counters, &self.timer)
    }

    pub fn set_unbuffered(&mut self, unbuffered: bool) {
        self.unbuffered = unbuffered;
    }

    pub fn rotation_handle(&self) -> RotationHandle {
        self.targets.handle()
    }

    /// Stage `destination`; it becomes active at the start of the next batch.
    pub fn request_rotation(&self, destination: Destination) -> Result<(), SinkError> {
        self.targets.handle().request_rotation(destination)
    }

    /// Stage closing the active target at the start of the next batch.
    pub fn request_close(&self) -> Result<(), SinkError> {
        self.targets.handle().request_close()
    }

    /// Write one batch of records. `items.len()` must be a multiple of
    /// `item_size`; tag offsets are absolute record indices.
    pub fn work(&mut self, items: &[u8], tags: &[Tag]) -> Result<usize, SinkError> {
        if self.closed {
            return Err(SinkError::Validation("sink is shut down".into()));
        }
        let item_size = self.config.item_size;
        if items.len() % item_size != 0 {
            return Err(SinkError::Validation(format!(
                "batch of {} bytes is not a multiple of item_size {}",
                items.len(),
                item_size
            )));
        }
        let n = items.len() / item_size;

        self.install_pending()?;
        self.counters.batches += 1;

        let base = self.items_read;
        let Some(target) = self.targets.active_mut() else {
            if !self.dropping {
                warn!(records = n, "no active target, dropping records");
                self.dropping = true;
            }
            self.counters.add_dropped(n);
            self.items_read += n as u64;
            return Ok(n);
        };

        let end = base + n as u64;
        let mut relative: Vec<(u64, &Tag)> = Vec::with_capacity(tags.len());
        for tag in tags {
            if (base..end).contains(&tag.offset) {
                relative.push((tag.offset - base, tag));
            } else {
                warn!(offset = tag.offset, key = %tag.key, base, end, "tag outside batch, skipped");
            }
        }
        relative.sort_by_key(|(rel, _)| *rel);

        let mut writer = SegmentWriter {
            headers: &mut self.headers,
            target,
            counters: &mut self.counters,
            timer: &mut self.timer,
            seg_records: &mut self.seg_records,
            max_segment_size: self.config.max_segment_size as u64,
            item_size,
        };

        match writer.run_batch(items, &relative) {
            Ok(written) => {
                self.items_read = end;
                if self.unbuffered {
                    writer
                        .target
                        .flush()
                        .map_err(|source| SinkError::Write { persisted: written, source })?;
                }
                Ok(written)
            }
            Err(e) => {
                if let Some(persisted) = e.persisted() {
                    self.items_read = base + persisted as u64;
                }
                Err(e)
            }
        }
    }

    /// Apply `key = value` at the current position, as a tag would.
    pub fn update_attribute(&mut self, key: &str, value: impl Into<AttrValue>) -> Result<(), SinkError> {
        let update = self.headers.prepare_update(key, value.into())?;
        self.counters.add_tag(true);

        let Some(target) = self.targets.active_mut() else {
            // Picked up by the header emitted on the next installed target.
            self.headers.apply(update);
            return Ok(());
        };

        let mut writer = SegmentWriter {
            headers: &mut self.headers,
            target,
            counters: &mut self.counters,
            timer: &mut self.timer,
            seg_records: &mut self.seg_records,
            max_segment_size: self.config.max_segment_size as u64,
            item_size: self.config.item_size,
        };
        writer.boundary(Some(update))?;
        if self.unbuffered {
            writer.target.flush()?;
        }
        Ok(())
    }

    /// Apply the last staged rotation or close command.
    fn install_pending(&mut self) -> Result<(), SinkError> {
        let Some(cmd) = self.targets.take_pending() else {
            return Ok(());
        };
        let t = Instant::now();

        let outgoing = match self.targets.take_active() {
            Some(old) => self.retire(old),
            None => Ok(()),
        };

        let result = match cmd {
            TargetCommand::Install(mut target) => {
                self.seg_records = 0;
                let slot = self.headers.emit_new(&mut target);
                match slot {
                    Ok(slot) => {
                        self.counters.add_header(slot.len);
                        self.counters.add_rotation();
                        info!(target_label = %target.label(), "rotated to new target");
                        self.targets.set_active(target);
                        self.dropping = false;
                        outgoing
                    }
                    Err(e) => {
                        close_quietly(target);
                        Err(e)
                    }
                }
            }
            TargetCommand::Detach => {
                info!("target detached");
                self.dropping = false;
                outgoing
            }
        };

        self.timer.add_stage_time(Stage::Rotate, t.elapsed());
        result
    }

    /// Close the running segment on `target`, then flush and release it.
    fn retire(&mut self, mut target: OutputTarget) -> Result<(), SinkError> {
        let closed = if self.headers.has_open_header() {
            SegmentWriter {
                headers: &mut self.headers,
                target: &mut target,
                counters: &mut self.counters,
                timer: &mut self.timer,
                seg_records: &mut self.seg_records,
                max_segment_size: self.config.max_segment_size as u64,
                item_size: self.config.item_size,
            }
            .close_segment()
        } else {
            Ok(())
        };

        self.headers.release_slot();
        self.seg_records = 0;

        let label = target.label().to_owned();
        let flushed = target.close();
        debug!(target_label = %label, "retired target");
        closed?;
        flushed?;
        Ok(())
    }

    /// Finalize the open header and close every target. Safe to call twice.
    pub fn shutdown(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = match self.targets.take_active() {
            Some(target) => self.retire(target),
            None => Ok(()),
        };
        self.targets.close_pending();
        self.timer.finish();

        info!(
            records = self.counters.records_written,
            segments = self.counters.segments_closed,
            dropped = self.counters.records_dropped,
            "meta sink shut down"
        );
        result
    }
}

impl Drop for MetaFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "shutdown on drop failed");
        }
    }
}
