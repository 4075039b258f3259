//! Tar container codec.
//!
//! Entries are a 512-byte header block followed by the payload padded to the
//! block size; the archive ends with two zero blocks. Reading and writing are
//! strictly sequential: an entry must be consumed (or skipped) before the next
//! one is requested.

mod extract;
mod write;

pub use extract::{extract_to, list_entries};
pub use write::write_sources;

use std::cell::Cell;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Size of one container block, and of a header.
pub const BLOCK_SIZE: usize = 512;

const CHECKSUM_FIELD: std::ops::Range<usize> = 148..156;

/// Check whether `block` holds a tar header with a valid checksum.
///
/// The stored checksum is compared against both the unsigned and the signed
/// (historic Sun tar) byte sum, with the checksum field itself counted as
/// spaces. Pure; never performs I/O.
pub fn is_valid_header(block: &[u8]) -> bool {
    if block.len() < BLOCK_SIZE {
        return false;
    }
    let block = &block[..BLOCK_SIZE];

    let field = trim_field(&block[CHECKSUM_FIELD]);
    if field.is_empty() {
        return false;
    }
    let stored = match std::str::from_utf8(field)
        .ok()
        .and_then(|s| u64::from_str_radix(s, 8).ok())
    {
        Some(v) => v,
        None => return false,
    };

    let mut unsigned: u64 = 0;
    let mut signed: i64 = 0;
    for (i, &b) in block.iter().enumerate() {
        let b = if CHECKSUM_FIELD.contains(&i) { b' ' } else { b };
        unsigned += u64::from(b);
        signed += i64::from(b as i8);
    }

    stored == unsigned || stored as i64 == signed
}

fn trim_field(field: &[u8]) -> &[u8] {
    let is_pad = |b: &u8| *b == b' ' || *b == 0;
    let start = field.iter().position(|b| !is_pad(b)).unwrap_or(field.len());
    let end = field.iter().rposition(|b| !is_pad(b)).map_or(start, |i| i + 1);
    &field[start..end]
}

/// What an entry materializes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    HardLink,
    Other,
}

impl From<tar::EntryType> for EntryKind {
    fn from(t: tar::EntryType) -> Self {
        if t.is_file() {
            Self::File
        } else if t.is_dir() {
            Self::Directory
        } else if t.is_symlink() {
            Self::Symlink
        } else if t.is_hard_link() {
            Self::HardLink
        } else {
            Self::Other
        }
    }
}

/// Metadata of one archive entry, as reported by listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub path: PathBuf,
    pub size: u64,
    pub kind: EntryKind,
    pub mode: u32,
}

/// Write side of the container. Owns the stream it writes into.
pub struct ContainerWriter<W: Write> {
    builder: tar::Builder<W>,
    entries: usize,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(sink: W) -> Self {
        let mut builder = tar::Builder::new(sink);
        builder.follow_symlinks(false);
        Self { builder, entries: 0 }
    }

    /// Number of entries written so far.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Append the filesystem object at `src` (file, directory or symlink) as `name`.
    pub fn append_path(&mut self, src: &Path, name: &Path) -> io::Result<()> {
        self.builder.append_path_with_name(src, name)?;
        self.entries += 1;
        Ok(())
    }

    /// Append a regular file entry whose payload is produced by `payload`.
    ///
    /// `payload` must yield exactly `size` bytes.
    pub fn append_data<R: Read>(&mut self, name: &Path, size: u64, mode: u32, payload: R) -> io::Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(size);
        header.set_mode(mode);
        header.set_mtime(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );

        let mut counted = Counted { inner: payload.take(size), count: 0 };
        self.builder.append_data(&mut header, name, &mut counted)?;
        if counted.count != size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "payload for {} ended after {} of {} bytes",
                    name.display(),
                    counted.count,
                    size
                ),
            ));
        }
        self.entries += 1;
        Ok(())
    }

    /// Write the trailer blocks and hand back the underlying stream.
    pub fn finish(self) -> io::Result<W> {
        self.builder.into_inner()
    }
}

struct Counted<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for Counted<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Healthy,
    Ended,
    Failed,
}

/// Shared view of whether the stream under a [`ContainerReader`] broke.
#[derive(Debug, Clone)]
pub struct StreamHealth(Rc<Cell<StreamState>>);

impl StreamHealth {
    /// True once the underlying stream returned an error, or ran dry while
    /// the container still expected data.
    pub fn is_broken(&self) -> bool {
        self.0.get() != StreamState::Healthy
    }
}

/// Source wrapper that records read failures and premature ends into a
/// [`StreamHealth`].
pub struct TrackedReader<R> {
    inner: R,
    state: Rc<Cell<StreamState>>,
}

impl<R: Read> Read for TrackedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() => {
                if self.state.get() == StreamState::Healthy {
                    self.state.set(StreamState::Ended);
                }
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                self.state.set(StreamState::Failed);
                Err(e)
            }
        }
    }
}

/// Read side of the container: a lazy, sequential sequence of entries.
///
/// The container reads exactly as far as it needs, so the source only runs
/// dry early when it is truncated.
pub struct ContainerReader<R: Read> {
    archive: tar::Archive<TrackedReader<R>>,
    state: Rc<Cell<StreamState>>,
}

impl<R: Read> ContainerReader<R> {
    pub fn new(source: R) -> Self {
        let state = Rc::new(Cell::new(StreamState::Healthy));
        let archive = tar::Archive::new(TrackedReader { inner: source, state: Rc::clone(&state) });
        Self { archive, state }
    }

    /// Whether unpacking may replace existing files.
    pub fn set_overwrite(&mut self, overwrite: bool) {
        self.archive.set_overwrite(overwrite);
    }

    pub fn health(&self) -> StreamHealth {
        StreamHealth(Rc::clone(&self.state))
    }

    /// Entries in archive order. Iteration ends at the trailer or at end of input.
    pub fn entries(&mut self) -> io::Result<tar::Entries<'_, TrackedReader<R>>> {
        self.archive.entries()
    }
}
