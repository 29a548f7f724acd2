// ## Output channels and destinations

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::constants::{FILE_BUFFER_CAPACITY, HEADER_FILE_SUFFIX};
use crate::types::SinkError;

/// A seekable byte sink the writer can append to and patch in place.
pub trait OutputChannel: Write + Seek + Send {
    /// Cut the channel to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

/// Buffered file channel.
#[derive(Debug)]
pub struct FileChannel {
    path: PathBuf,
    inner: BufWriter<File>,
}

impl FileChannel {
    /// Create or truncate `path`.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| SinkError::Open { path: path.to_path_buf(), source })?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: BufWriter::with_capacity(FILE_BUFFER_CAPACITY, file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for FileChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FileChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl OutputChannel for FileChannel {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().set_len(len)
    }
}

/// In-memory channel. Clones share the bytes but keep their own cursor.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
    pos: u64,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Vec<u8>>> {
        self.buf
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "shared buffer lock poisoned"))
    }

    /// Copy of the current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh cursor at offset 0 over the same bytes.
    fn rewound(&self) -> Self {
        Self { buf: Arc::clone(&self.buf), pos: 0 }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let pos = self.pos as usize;
        {
            let mut guard = self.lock()?;
            if guard.len() < pos {
                guard.resize(pos, 0);
            }
            let overlap = (guard.len() - pos).min(data.len());
            guard[pos..pos + overlap].copy_from_slice(&data[..overlap]);
            guard.extend_from_slice(&data[overlap..]);
        }
        self.pos += data.len() as u64;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.lock()?.len() as i128;
        let next = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::End(d) => len + d as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
        };
        if next < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }
        self.pos = next as u64;
        Ok(self.pos)
    }
}

impl OutputChannel for SharedBuffer {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.lock()?.truncate(len as usize);
        Ok(())
    }
}

/// Pair of in-memory channels for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub data: SharedBuffer,
    pub header: SharedBuffer,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_bytes(&self) -> Vec<u8> {
        self.data.contents()
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        self.header.contents()
    }
}

/// Where a target writes.
pub enum Destination {
    /// `path` for data (and inline headers); split mode adds `<path>.hdr`.
    File(PathBuf),
    Memory(MemorySink),
    /// Caller-provided channels. `header` is required in split mode only.
    Channels {
        data: Box<dyn OutputChannel>,
        header: Option<Box<dyn OutputChannel>>,
    },
}

impl Destination {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Destination::File(path.into())
    }

    pub fn label(&self) -> String {
        match self {
            Destination::File(p) => p.display().to_string(),
            Destination::Memory(_) => "<memory>".to_string(),
            Destination::Channels { .. } => "<channels>".to_string(),
        }
    }
}

/// Header path used in split mode for a data file.
pub fn header_path_for(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(HEADER_FILE_SUFFIX);
    PathBuf::from(s)
}

/// Open the channels behind `dest`. Returns `(label, data, header)`.
pub(crate) fn open_channels(
    dest: Destination,
    split: bool,
) -> Result<(String, Box<dyn OutputChannel>, Option<Box<dyn OutputChannel>>), SinkError> {
    let label = dest.label();
    match dest {
        Destination::File(path) => {
            let header: Option<Box<dyn OutputChannel>> = if split {
                Some(Box::new(FileChannel::create(&header_path_for(&path))?))
            } else {
                None
            };
            let data: Box<dyn OutputChannel> = Box::new(FileChannel::create(&path)?);
            debug!(path = %path.display(), split, "opened file destination");
            Ok((label, data, header))
        }
        Destination::Memory(sink) => {
            let mut data = sink.data.rewound();
            data.truncate(0)?;
            let header: Option<Box<dyn OutputChannel>> = if split {
                let mut h = sink.header.rewound();
                h.truncate(0)?;
                Some(Box::new(h))
            } else {
                None
            };
            Ok((label, Box::new(data) as Box<dyn OutputChannel>, header))
        }
        Destination::Channels { data, header } => match (split, header) {
            (true, Some(h)) => Ok((label, data, Some(h))),
            (true, None) => Err(SinkError::Validation(
                "split header mode needs a header channel".into(),
            )),
            (false, Some(_)) => Err(SinkError::Validation(
                "header channel given but split header mode is off".into(),
            )),
            (false, None) => Ok((label, data, None)),
        },
    }
}
