//! Archive format handlers.
//!
//! A [`Format`] recognizes, creates and unpacks one kind of archive. The
//! built-in [`TarZst`] composes a tar container with a zstd stream; formats
//! are looked up by identifier or by path through [`registry::global`].

pub mod container;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod registry;
pub mod sniff;
pub mod tar_zst;

// Re-exports
pub use container::{EntryKind, EntrySummary, BLOCK_SIZE};
pub use error::{ArchiveError, ErrorKind, RegistryError, Result};
pub use format::Format;
pub use pipeline::{MakeReport, PartialArchive};
pub use registry::FormatRegistry;
pub use tar_zst::{TarZst, TarZstOptions, TAR_ZST, TAR_ZST_ID};
pub use zstd_stream::{ZstdCodec, ZstdOptions};
