// ## `mod.rs` — public facade + re-exports

//! sink — segmented, self-describing record writer.
//!
//! Layering, leaves first: `io` (channels, destinations) → `slot` / `target`
//! (header slots, active target, rotation commands) → `header_manager`
//! (emit/finalize) → `write_loop` (per-batch state machine) → `core`
//! (`MetaFileSink`).

pub mod io;
pub mod slot;
pub mod target;
pub mod header_manager;
pub mod write_loop;
pub mod core;

pub use io::{
    header_path_for,
    Destination,
    FileChannel,
    MemorySink,
    OutputChannel,
    SharedBuffer,
};

pub use slot::HeaderSlot;
pub use target::{OutputTarget, RotationHandle, TargetCommand};
pub use header_manager::{AttributeError, PreparedUpdate, SegmentHeaderManager};
pub use write_loop::{LoopState, Tag};
pub use self::core::MetaFileSink;
