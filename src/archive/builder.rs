use crate::config::ArchiveCompression;
use crate::error::{ArchiveError, Error, Result};
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// One file to place in an archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File on disk
    pub source: PathBuf,
    /// Relative name inside the archive, `/`-separated
    pub name: String,
}

impl ArchiveEntry {
    /// Entry stored under the source's file name
    pub fn flat(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { source, name }
    }
}

/// Reject names that are empty, absolute, or walk out of the archive root
fn validate_entry_name(name: &str) -> Result<()> {
    let invalid = || {
        Error::Archive(ArchiveError::InvalidEntryName {
            name: name.to_string(),
        })
    };

    if name.is_empty() || name.starts_with('/') || name.contains('\\') {
        return Err(invalid());
    }
    let all_normal = Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !all_normal || name.split('/').any(|part| part.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

/// Write `entries` into a new archive at `archive_path`
///
/// Entries are written in the given order with a fixed timestamp and permissions, so
/// the same inputs always produce the same archive. A partially written archive is
/// removed before the error is returned.
pub fn build_archive(
    archive_path: &Path,
    entries: &[ArchiveEntry],
    compression: ArchiveCompression,
) -> Result<PathBuf> {
    for entry in entries {
        validate_entry_name(&entry.name)?;
    }

    debug!(?archive_path, entries = entries.len(), "building archive");

    if let Err(reason) = write_entries(archive_path, entries, compression) {
        std::fs::remove_file(archive_path).ok();
        return Err(Error::Archive(ArchiveError::WriteFailed {
            archive: archive_path.to_path_buf(),
            reason,
        }));
    }

    info!(?archive_path, entries = entries.len(), "archive written");
    Ok(archive_path.to_path_buf())
}

fn write_entries(
    archive_path: &Path,
    entries: &[ArchiveEntry],
    compression: ArchiveCompression,
) -> std::result::Result<(), String> {
    let file = File::create(archive_path)
        .map_err(|e| format!("failed to create archive file: {}", e))?;
    let mut writer = zip::ZipWriter::new(file);

    let method = match compression {
        ArchiveCompression::Stored => zip::CompressionMethod::Stored,
        ArchiveCompression::Deflated => zip::CompressionMethod::Deflated,
    };
    let options = zip::write::FileOptions::default()
        .compression_method(method)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    for entry in entries {
        let mut input = File::open(&entry.source)
            .map_err(|e| format!("failed to open {}: {}", entry.source.display(), e))?;
        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|e| format!("failed to start entry {}: {}", entry.name, e))?;
        std::io::copy(&mut input, &mut writer)
            .map_err(|e| format!("failed to write entry {}: {}", entry.name, e))?;
    }

    writer
        .finish()
        .map_err(|e| format!("failed to finish archive: {}", e))?;
    Ok(())
}

/// Collect every regular file under `dir` as entries named relative to `dir`
///
/// Entries are sorted by name. The absolute location of `dir` never appears in a name.
pub fn entries_from_dir(dir: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    collect_entries(dir, dir, &mut entries)?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn collect_entries(root: &Path, dir: &Path, entries: &mut Vec<ArchiveEntry>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            collect_entries(root, &path, entries)?;
        } else if file_type.is_file() {
            let relative = path.strip_prefix(root).map_err(|e| {
                Error::Other(format!("{} is outside {}: {}", path.display(), root.display(), e))
            })?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(ArchiveEntry { source: path, name });
        }
    }
    Ok(())
}
