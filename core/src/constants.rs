/// Magic number opening every segment header.
/// "SGMH" = SeGMent Header
pub const MAGIC_SGMH: [u8; 4] = *b"SGMH";

/// Current metadata format version written into `version`.
pub const METADATA_VERSION: u16 = 1;

/// Serialized size of the fixed header portion. Never changes with field values.
pub const HEADER_FIXED_SIZE: usize = 64;

/// Bytes of the fixed header covered by the trailing CRC32.
pub const HEADER_CRC_SPAN: usize = 56;

/// Suffix appended to the data path for the header channel in split mode.
pub const HEADER_FILE_SUFFIX: &str = ".hdr";

/// Defaults when the caller does not override them.
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = 1_000_000;
pub const DEFAULT_SAMPLE_RATE: f64 = 1.0;
pub const DEFAULT_RELATIVE_RATE: f64 = 1.0;

/// Capacity of the buffered writer wrapping file channels.
pub const FILE_BUFFER_CAPACITY: usize = 64 * 1024;

/// Keys naming the fixed header fields. Tags and attribute updates carrying
/// one of these keys patch the header; every other key lands in the extras.
pub mod keys {
    pub const VERSION: &str = "version";
    pub const RX_RATE: &str = "rx_rate";
    pub const RX_TIME: &str = "rx_time";
    pub const SIZE: &str    = "size";
    pub const TYPE: &str    = "type";
    pub const CPLX: &str    = "cplx";
    pub const STRT: &str    = "strt";
    pub const BYTES: &str   = "bytes";

    pub const ALL: &[&str] = &[VERSION, RX_RATE, RX_TIME, SIZE, TYPE, CPLX, STRT, BYTES];
}
