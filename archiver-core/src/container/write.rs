use std::fs;
use std::io::{self, Write};
use std::path::{is_separator, Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::ContainerWriter;
use crate::error::{ArchiveError, Result};

/// Stream every source into `writer`, in the order given.
///
/// A regular file is stored under its file name. A directory is walked
/// recursively (sorted by name, symlinks stored as links) and rooted at its
/// own name, unless the path is spelled with a trailing separator (`src/`), in
/// which case its contents are placed at the archive root.
///
/// `exclude` names a file that must never be archived, typically the archive
/// being written when it sits inside one of the sources.
///
/// Returns the number of entries written.
pub fn write_sources<W: Write>(
    writer: &mut ContainerWriter<W>,
    sources: &[PathBuf],
    exclude: Option<&Path>,
) -> Result<usize> {
    let before = writer.entries();
    for source in sources {
        write_source(writer, source, exclude)?;
    }
    Ok(writer.entries() - before)
}

fn write_source<W: Write>(writer: &mut ContainerWriter<W>, source: &Path, exclude: Option<&Path>) -> Result<()> {
    let meta = fs::symlink_metadata(source).map_err(|e| ArchiveError::writer(source, e))?;

    let root_name = match source.file_name() {
        Some(name) if !(meta.is_dir() && names_contents(source)) => Some(PathBuf::from(name)),
        _ => None,
    };

    if !meta.is_dir() {
        let name = root_name.ok_or_else(|| {
            ArchiveError::writer(source, io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))
        })?;
        debug!("adding {} as {}", source.display(), name.display());
        return writer
            .append_path(source, &name)
            .map_err(|e| ArchiveError::writer(source, e));
    }

    // The walk never descends through symlinks, so the real root joined with
    // a relative name is already canonical.
    let real_root = match exclude {
        Some(_) => Some(fs::canonicalize(source).map_err(|e| ArchiveError::writer(source, e))?),
        None => None,
    };

    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            ArchiveError::writer(path, io::Error::from(e))
        })?;

        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ArchiveError::writer(entry.path(), io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let name = match &root_name {
            Some(root) if rel.as_os_str().is_empty() => root.clone(),
            Some(root) => root.join(rel),
            None if rel.as_os_str().is_empty() => continue,
            None => rel.to_path_buf(),
        };

        let excluded = match (&real_root, exclude) {
            (Some(real_root), Some(exclude)) => real_root.join(rel) == exclude,
            _ => false,
        };
        if excluded && entry.file_type().is_file() {
            debug!("skipping {} (archive being written)", entry.path().display());
            continue;
        }

        debug!("adding {} as {}", entry.path().display(), name.display());
        writer
            .append_path(entry.path(), &name)
            .map_err(|e| ArchiveError::writer(entry.path(), e))?;
    }

    Ok(())
}

/// `src/` names the directory's contents, `src` the directory itself.
fn names_contents(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .chars()
        .last()
        .is_some_and(is_separator)
}
