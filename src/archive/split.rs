use crate::error::{ArchiveError, Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A size-bounded group of files destined for one archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveBin {
    /// Zero-based bin number
    pub index: usize,
    /// Directory the bin's files were moved into
    pub dir: PathBuf,
    /// Files of the bin, in packing order
    pub files: Vec<PathBuf>,
    /// Sum of the file sizes
    pub total_bytes: u64,
    /// The bin holds a single file larger than the ceiling
    pub oversized: bool,
}

/// Greedy left-to-right packing of `sizes` into bins of at most `ceiling` bytes
///
/// Returns the indices of `sizes` per bin. A new bin opens whenever the next file would
/// push the open bin over the ceiling. A file larger than the ceiling therefore always
/// ends up alone in its own bin.
pub fn plan_bins(sizes: &[u64], ceiling: u64) -> Vec<Vec<usize>> {
    let mut bins = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_size: u64 = 0;

    for (i, &size) in sizes.iter().enumerate() {
        if !current.is_empty() && current_size.saturating_add(size) > ceiling {
            bins.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current.push(i);
        current_size = current_size.saturating_add(size);
    }

    if !current.is_empty() {
        bins.push(current);
    }
    bins
}

/// Move the regular files of `source_dir` into `dest_dir/dir_{n}` bins
///
/// Files are taken in file-name order. Subdirectories of `source_dir` are left alone.
/// Once this returns, `source_dir` holds no regular files.
pub fn split_into_bins(source_dir: &Path, dest_dir: &Path, ceiling: u64) -> Result<Vec<ArchiveBin>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(source_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            let size = entry.metadata()?.len();
            files.push((entry.path(), size));
        }
    }
    files.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));

    let sizes: Vec<u64> = files.iter().map(|(_, size)| *size).collect();
    let plan = plan_bins(&sizes, ceiling);

    std::fs::create_dir_all(dest_dir)?;

    let mut bins = Vec::with_capacity(plan.len());
    for (index, members) in plan.into_iter().enumerate() {
        let dir = dest_dir.join(format!("dir_{}", index));
        std::fs::create_dir_all(&dir)?;

        let mut moved = Vec::with_capacity(members.len());
        let mut total_bytes: u64 = 0;
        for i in members {
            let (path, size) = &files[i];
            moved.push(move_into(path, &dir)?);
            total_bytes = total_bytes.saturating_add(*size);
        }

        let oversized = total_bytes > ceiling;
        if oversized {
            warn!(
                bin = index,
                total_bytes, ceiling, "single file exceeds the archive ceiling, sending it alone"
            );
        }
        debug!(bin = index, files = moved.len(), total_bytes, "filled bin");

        bins.push(ArchiveBin {
            index,
            dir,
            files: moved,
            total_bytes,
            oversized,
        });
    }

    info!(?source_dir, bins = bins.len(), files = files.len(), "split files into bins");
    Ok(bins)
}

/// Move `path` into `dir`, falling back to copy + remove across filesystems
fn move_into(path: &Path, dir: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        Error::Archive(ArchiveError::MoveFailed {
            source_path: path.to_path_buf(),
            dest_path: dir.to_path_buf(),
            reason: "path has no file name".to_string(),
        })
    })?;
    let dest = dir.join(file_name);

    if std::fs::rename(path, &dest).is_ok() {
        return Ok(dest);
    }

    std::fs::copy(path, &dest)
        .and_then(|_| std::fs::remove_file(path))
        .map_err(|e| {
            Error::Archive(ArchiveError::MoveFailed {
                source_path: path.to_path_buf(),
                dest_path: dest.clone(),
                reason: e.to_string(),
            })
        })?;
    Ok(dest)
}
