use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use log::{debug, warn};

use super::{ContainerReader, EntryKind, EntrySummary};
use crate::error::{ArchiveError, Result};

/// Materialize every entry of `reader` below `dest`.
///
/// Nothing is written outside `dest`. An entry fails with
/// [`ArchiveError::Traversal`], before anything is written for it, when its
/// name is absolute or climbs out with `..`, when its parent directory
/// resolves outside `dest` through symlinks already on disk, or when it is a
/// link whose target resolves outside `dest`. Errors reading the stream,
/// including a stream that ends inside an entry, are reported as
/// [`ArchiveError::Decode`] against `archive`; filesystem errors as
/// [`ArchiveError::Extract`] against the offending target.
///
/// Returns the number of entries materialized.
pub fn extract_to<R: Read>(
    reader: &mut ContainerReader<R>,
    archive: &Path,
    dest: &Path,
    overwrite: bool,
) -> Result<usize> {
    fs::create_dir_all(dest).map_err(|e| ArchiveError::extract(dest, e))?;
    let root = fs::canonicalize(dest).map_err(|e| ArchiveError::extract(dest, e))?;

    reader.set_overwrite(overwrite);
    let health = reader.health();
    let decode = |e: io::Error| ArchiveError::decode(archive, e);
    let mut count = 0;

    for entry in reader.entries().map_err(decode)? {
        let mut entry = entry.map_err(decode)?;
        let raw = entry.path().map_err(decode)?.into_owned();
        let rel = contained(&raw).ok_or_else(|| traversal(archive, &raw))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&rel);
        let kind = EntryKind::from(entry.header().entry_type());

        if kind == EntryKind::Other {
            warn!(
                "{}: skipping {} (unsupported entry type {:?})",
                archive.display(),
                raw.display(),
                entry.header().entry_type()
            );
            continue;
        }

        let parent = real_path(target.parent().unwrap_or(dest)).map_err(|e| ArchiveError::extract(&target, e))?;
        if !parent.starts_with(&root) {
            return Err(traversal(archive, &raw));
        }

        match kind {
            EntryKind::Symlink => {
                let link = link_target(&entry, archive, &raw)?;
                if link.is_absolute() || !resolve_link(&parent, &link).starts_with(&root) {
                    return Err(traversal(archive, &raw));
                }
            }
            EntryKind::HardLink => {
                let link = link_target(&entry, archive, &raw)?;
                let original = dest.join(contained(&link).ok_or_else(|| traversal(archive, &raw))?);
                let real = fs::canonicalize(&original).map_err(|e| ArchiveError::extract(&original, e))?;
                if !real.starts_with(&root) {
                    return Err(traversal(archive, &raw));
                }
            }
            _ => {}
        }

        if kind != EntryKind::Directory {
            clear_target(&target, overwrite)?;
        }

        let expected = entry.size();
        let unpacked = entry.unpack_in(dest).map_err(|e| {
            if health.is_broken() {
                decode(e)
            } else {
                ArchiveError::extract(&target, e)
            }
        })?;
        if health.is_broken() {
            return Err(decode(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive ends inside {} ({} bytes expected)", raw.display(), expected),
            )));
        }
        if !unpacked {
            warn!("{}: {} was not unpacked", archive.display(), raw.display());
            continue;
        }

        debug!("extracted {}", target.display());
        count += 1;
    }

    Ok(count)
}

/// Read the metadata of every entry without writing anything.
pub fn list_entries<R: Read>(reader: &mut ContainerReader<R>, archive: &Path) -> Result<Vec<EntrySummary>> {
    let decode = |e: io::Error| ArchiveError::decode(archive, e);
    let mut out = Vec::new();

    for entry in reader.entries().map_err(decode)? {
        let entry = entry.map_err(decode)?;
        out.push(EntrySummary {
            path: entry.path().map_err(decode)?.into_owned(),
            size: entry.size(),
            kind: EntryKind::from(entry.header().entry_type()),
            mode: entry.header().mode().map_err(decode)?,
        });
    }

    Ok(out)
}

/// Strip `.` components; `None` if the path is absolute or uses `..`.
fn contained(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Where `dir` lands on disk once its missing components are created as
/// plain directories.
fn real_path(dir: &Path) -> io::Result<PathBuf> {
    let mut missing = Vec::new();
    let mut cur = dir;
    loop {
        match fs::canonicalize(cur) {
            Ok(mut real) => {
                real.extend(missing.iter().rev());
                return Ok(real);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(name), Some(up)) = (cur.file_name(), cur.parent()) else {
                    return Err(e);
                };
                missing.push(name);
                cur = up;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Resolve a relative symlink target from the real directory `base`,
/// following the symlinks that already exist along the way.
fn resolve_link(base: &Path, link: &Path) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in link.components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                if let Ok(real) = fs::canonicalize(&out) {
                    out = real;
                }
            }
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

fn link_target<R: Read>(entry: &tar::Entry<'_, R>, archive: &Path, raw: &Path) -> Result<PathBuf> {
    match entry.link_name() {
        Ok(Some(link)) => Ok(link.into_owned()),
        Ok(None) => Err(ArchiveError::decode(
            archive,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("link entry {} has no target", raw.display()),
            ),
        )),
        Err(e) => Err(ArchiveError::decode(archive, e)),
    }
}

fn traversal(archive: &Path, entry: &Path) -> ArchiveError {
    ArchiveError::Traversal {
        archive: archive.to_path_buf(),
        entry: entry.to_path_buf(),
    }
}

/// Apply the overwrite policy to whatever already sits at `target`.
///
/// Existing non-directories are removed rather than written through, so a
/// pre-existing symlink cannot redirect the entry.
fn clear_target(target: &Path, overwrite: bool) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => Err(ArchiveError::extract(
            target,
            io::Error::new(io::ErrorKind::AlreadyExists, "a directory is in the way"),
        )),
        Ok(_) if !overwrite => Err(ArchiveError::extract(
            target,
            io::Error::new(io::ErrorKind::AlreadyExists, "file exists"),
        )),
        Ok(_) => fs::remove_file(target).map_err(|e| ArchiveError::extract(target, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArchiveError::extract(target, e)),
    }
}
