//! The tar + zstd format (`.tar.zst`, `.tzst`).

use std::path::{Path, PathBuf};

use zstd_stream::{ZstdCodec, ZstdOptions};

use crate::container::EntrySummary;
use crate::error::Result;
use crate::format::Format;
use crate::pipeline::{self, MakeReport, PartialArchive};
use crate::sniff;

/// Identifier the format is registered under.
pub const TAR_ZST_ID: &str = "TarZst";

/// Construction-time choices of a [`TarZst`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TarZstOptions {
    /// Compression settings used by Make. Decompression ignores them.
    pub compression: ZstdOptions,

    /// What happens to the destination file when Make fails after creating
    /// it. The default keeps the partial file so the caller can inspect it;
    /// nothing is retried either way.
    pub partial: PartialArchive,

    /// Make replaces an existing regular file and Open replaces existing
    /// files when set. Make never replaces directories or other non-regular
    /// entries.
    pub overwrite: bool,
}

impl TarZstOptions {
    pub const fn new() -> Self {
        Self {
            compression: ZstdOptions::new(),
            partial: PartialArchive::Keep,
            overwrite: true,
        }
    }
}

impl Default for TarZstOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Tar container compressed with zstd.
///
/// Holds only its options; every call builds its own pipeline, so one value
/// can be shared freely between threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TarZst {
    options: TarZstOptions,
}

/// Handle with default options.
pub static TAR_ZST: TarZst = TarZst::new();

impl TarZst {
    pub const fn new() -> Self {
        Self::with_options(TarZstOptions::new())
    }

    pub const fn with_options(options: TarZstOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TarZstOptions {
        &self.options
    }

    fn codec(&self) -> ZstdCodec {
        ZstdCodec::new(self.options.compression)
    }

    /// Make, reporting what was written.
    pub fn make_with_report(&self, destination: &Path, sources: &[PathBuf]) -> Result<MakeReport> {
        pipeline::make_archive(
            destination,
            sources,
            &self.codec(),
            self.options.overwrite,
            self.options.partial,
        )
    }

    /// Open, reporting how many entries were materialized.
    pub fn open_with_count(&self, source: &Path, destination: &Path) -> Result<usize> {
        pipeline::open_archive(source, destination, &self.codec(), self.options.overwrite)
    }
}

impl Format for TarZst {
    fn name(&self) -> &'static str {
        TAR_ZST_ID
    }

    /// True for a `.tar.zst`/`.tzst` name (the file need not exist), or for
    /// a file whose first decompressed block is a valid tar header.
    fn matches(&self, path: &Path) -> bool {
        sniff::has_tar_zst_extension(path) || sniff::sniff_tar_zst(path)
    }

    /// Regular files are stored under their own name; directories are added
    /// recursively (see [`crate::container::write_sources`]). A failure after
    /// the destination was created leaves it behind unless the handle was
    /// built with [`PartialArchive::Remove`].
    fn make(&self, destination: &Path, sources: &[PathBuf]) -> Result<()> {
        self.make_with_report(destination, sources).map(|_| ())
    }

    fn open(&self, source: &Path, destination: &Path) -> Result<()> {
        self.open_with_count(source, destination).map(|_| ())
    }

    fn list(&self, source: &Path) -> Result<Vec<EntrySummary>> {
        pipeline::list_archive(source, &self.codec())
    }
}
