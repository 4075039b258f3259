//! Pipeline sessions: file, compression stream and container codec composed
//! for one Make, Open or List call.
//!
//! Each layer owns the one below it, so whatever path a call leaves by, the
//! container is dropped before the compressor and the compressor before the
//! file. On the success path every layer is finalized explicitly, in that
//! order, and the first finalization error is reported.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use zstd_stream::ZstdCodec;

use crate::container::{extract_to, list_entries, write_sources, ContainerReader, ContainerWriter, EntrySummary};
use crate::error::{ArchiveError, Result};

/// What to do with a destination file that a failed Make already created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialArchive {
    /// Leave the partially written file on disk.
    #[default]
    Keep,
    /// Delete it before returning the error.
    Remove,
}

/// Outcome of a successful Make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MakeReport {
    /// Container entries written.
    pub entries: usize,
    /// Uncompressed container bytes, headers and padding included.
    pub bytes_in: u64,
}

/// Write `sources` through a compressor and a container writer into `sink`.
///
/// Returns the sink once both layers are finalized. `archive` only labels errors.
pub fn write_session<W: Write>(
    sink: W,
    codec: &ZstdCodec,
    sources: &[PathBuf],
    exclude: Option<&Path>,
    archive: &Path,
) -> Result<(W, MakeReport)> {
    let compressor = codec.writer(sink).map_err(|e| ArchiveError::writer(archive, e))?;
    let mut container = ContainerWriter::new(compressor);

    let entries = write_sources(&mut container, sources, exclude)?;

    let compressor = container.finish().map_err(|e| ArchiveError::writer(archive, e))?;
    let bytes_in = compressor.bytes_in();
    let sink = compressor.finish().map_err(|e| ArchiveError::writer(archive, e))?;

    Ok((sink, MakeReport { entries, bytes_in }))
}

/// Decompress and unpack `source` into `dest`. `archive` only labels errors.
pub fn read_session<R: Read>(
    source: R,
    codec: &ZstdCodec,
    archive: &Path,
    dest: &Path,
    overwrite: bool,
) -> Result<usize> {
    let decompressor = codec.reader(source).map_err(|e| ArchiveError::decode(archive, e))?;
    let mut container = ContainerReader::new(decompressor);
    extract_to(&mut container, archive, dest, overwrite)
}

/// Decompress `source` and describe its entries.
pub fn list_session<R: Read>(source: R, codec: &ZstdCodec, archive: &Path) -> Result<Vec<EntrySummary>> {
    let decompressor = codec.reader(source).map_err(|e| ArchiveError::decode(archive, e))?;
    let mut container = ContainerReader::new(decompressor);
    list_entries(&mut container, archive)
}

/// Create `destination` and write an archive of `sources` into it.
///
/// Fails with [`ArchiveError::Create`] without touching the filesystem when
/// `destination` exists and is not a regular file, or is a regular file and
/// `overwrite` is off. After creation, a failure leaves the partial file in
/// place unless `partial` is [`PartialArchive::Remove`].
pub fn make_archive(
    destination: &Path,
    sources: &[PathBuf],
    codec: &ZstdCodec,
    overwrite: bool,
    partial: PartialArchive,
) -> Result<MakeReport> {
    check_destination(destination, overwrite)?;

    let file = File::create(destination).map_err(|e| ArchiveError::create(destination, e))?;
    debug!("session opened: writing {}", destination.display());

    // Never archive the archive itself.
    let exclude = fs::canonicalize(destination).ok();

    let result = write_session(file, codec, sources, exclude.as_deref(), destination).and_then(|(file, report)| {
        file.sync_all().map_err(|e| ArchiveError::writer(destination, e))?;
        Ok(report)
    });

    match &result {
        Ok(report) => debug!(
            "session closed: {} ({} entries, {} bytes before compression)",
            destination.display(),
            report.entries,
            report.bytes_in
        ),
        Err(e) if partial == PartialArchive::Remove => {
            warn!("removing partial archive {} after error: {}", destination.display(), e);
            if let Err(rm) = fs::remove_file(destination) {
                warn!("could not remove {}: {}", destination.display(), rm);
            }
        }
        Err(e) => warn!("partial archive left at {} after error: {}", destination.display(), e),
    }

    result
}

/// Open `source` and unpack it into `destination`.
pub fn open_archive(source: &Path, destination: &Path, codec: &ZstdCodec, overwrite: bool) -> Result<usize> {
    let file = open_source(source)?;
    debug!("session opened: reading {}", source.display());
    let count = read_session(file, codec, source, destination, overwrite)?;
    debug!("session closed: {} entries from {}", count, source.display());
    Ok(count)
}

/// Open `source` and describe its entries.
pub fn list_archive(source: &Path, codec: &ZstdCodec) -> Result<Vec<EntrySummary>> {
    let file = open_source(source)?;
    list_session(file, codec, source)
}

fn open_source(source: &Path) -> Result<File> {
    let file = File::open(source).map_err(|e| ArchiveError::open(source, e))?;
    let meta = file.metadata().map_err(|e| ArchiveError::open(source, e))?;
    if meta.is_dir() {
        return Err(ArchiveError::open(
            source,
            io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
        ));
    }
    Ok(file)
}

fn check_destination(destination: &Path, overwrite: bool) -> Result<()> {
    match fs::symlink_metadata(destination) {
        Ok(meta) if !meta.is_file() => Err(ArchiveError::create(
            destination,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination exists and is not a regular file"),
        )),
        Ok(_) if !overwrite => Err(ArchiveError::create(
            destination,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
        )),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArchiveError::create(destination, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::tempdir;
    use zstd_stream::ZstdOptions;

    /// Sink that fails once `budget` bytes have been accepted and counts its drops.
    #[derive(Debug)]
    struct FailingSink {
        budget: usize,
        written: Vec<u8>,
        drops: Rc<Cell<usize>>,
    }

    impl FailingSink {
        fn new(budget: usize) -> (Self, Rc<Cell<usize>>) {
            let drops = Rc::new(Cell::new(0));
            let sink = Self { budget, written: Vec::new(), drops: Rc::clone(&drops) };
            (sink, drops)
        }
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len().saturating_add(buf.len()) > self.budget {
                return Err(io::Error::new(io::ErrorKind::Other, "sink full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for FailingSink {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn noisy_bytes(len: usize) -> Vec<u8> {
        let mut x: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (x >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn writer_collaborator_failure_releases_sink() {
        let dir = tempdir().unwrap();
        let (sink, drops) = FailingSink::new(usize::MAX);

        let err = write_session(
            sink,
            &ZstdCodec::default(),
            &[dir.path().join("missing")],
            None,
            Path::new("out.tar.zst"),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Writer);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn sink_failure_while_streaming_releases_sink() {
        let dir = tempdir().unwrap();
        let big = dir.path().join("big.bin");
        fs::write(&big, noisy_bytes(512 * 1024)).unwrap();

        let codec = ZstdCodec::new(ZstdOptions { buffer_size: 64, ..ZstdOptions::default() });
        let (sink, drops) = FailingSink::new(4096);

        let err = write_session(sink, &codec, &[big], None, Path::new("out.tar.zst")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Writer);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn sink_failure_at_finish_releases_sink() {
        let dir = tempdir().unwrap();
        let small = dir.path().join("small.txt");
        fs::write(&small, "tiny").unwrap();

        let (sink, drops) = FailingSink::new(0);
        let err = write_session(sink, &ZstdCodec::default(), &[small], None, Path::new("out.tar.zst")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Writer);
        assert!(err.to_string().contains("out.tar.zst"));
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn success_hands_the_sink_back() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "hi").unwrap();

        let (sink, drops) = FailingSink::new(usize::MAX);
        let (sink, report) = write_session(sink, &ZstdCodec::default(), &[file], None, Path::new("x")).unwrap();
        assert_eq!(drops.get(), 0);
        assert_eq!(report.entries, 1);
        assert!(report.bytes_in >= 3 * crate::container::BLOCK_SIZE as u64);

        let out = dir.path().join("unpacked");
        let count = read_session(sink.written.as_slice(), &ZstdCodec::default(), Path::new("x"), &out, false).unwrap();
        assert_eq!(count, 1);
        assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "hi");

        drop(sink);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn remove_policy_deletes_partial_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.tar.zst");
        let missing = dir.path().join("missing");

        let err = make_archive(&dest, &[missing.clone()], &ZstdCodec::default(), true, PartialArchive::Remove)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Writer);
        assert!(!dest.exists());

        let err = make_archive(&dest, &[missing], &ZstdCodec::default(), true, PartialArchive::Keep).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Writer);
        assert!(dest.exists());
    }

    #[test]
    fn existing_file_needs_overwrite() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "hi").unwrap();
        let dest = dir.path().join("out.tar.zst");
        fs::write(&dest, "precious").unwrap();

        let err = make_archive(&dest, &[src.clone()], &ZstdCodec::default(), false, PartialArchive::Keep)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Create);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "precious");

        make_archive(&dest, &[src], &ZstdCodec::default(), true, PartialArchive::Keep).unwrap();
        assert_ne!(fs::read(&dest).unwrap(), b"precious");
    }

    #[test]
    fn directory_source_is_an_open_error() {
        let dir = tempdir().unwrap();
        let err = open_archive(dir.path(), &dir.path().join("out"), &ZstdCodec::default(), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Open);
    }
}
