use std::fmt;
use std::path::{Path, PathBuf};

use crate::container::EntrySummary;
use crate::error::Result;

/// One archive format: how to recognize, create and unpack it.
///
/// Implementations hold no mutable state, so one handle can serve any number
/// of concurrent calls; each call builds its own pipeline.
pub trait Format: Send + Sync + fmt::Debug {
    /// Identifier the format is registered under.
    fn name(&self) -> &'static str;

    /// Whether `path` looks like this format, by name or by content.
    /// Never fails: any error while probing means "no".
    fn matches(&self, path: &Path) -> bool;

    /// Create an archive at `destination` holding `sources`, in order.
    fn make(&self, destination: &Path, sources: &[PathBuf]) -> Result<()>;

    /// Unpack the archive at `source` into the directory `destination`.
    fn open(&self, source: &Path, destination: &Path) -> Result<()>;

    /// Describe the entries of the archive at `source`.
    fn list(&self, source: &Path) -> Result<Vec<EntrySummary>>;
}
