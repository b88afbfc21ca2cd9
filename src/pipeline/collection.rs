//! Whole-set jobs

use super::{Job, JobItem, JobOutcome, Pipeline, check_cancelled};
use crate::archive::{ArchiveBin, entries_from_dir, split_into_bins};
use crate::error::{Error, Result};
use crate::types::Event;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Downloaded payloads when they are kept out of the archives
const SOURCES_DIR: &str = "sources";
/// Converted outputs (and kept payloads), emptied by the splitter
const TEMP_DIR: &str = "temp";
/// Per-bin directories `split/dir_{n}`
const SPLIT_DIR: &str = "split";

impl Pipeline {
    /// Fetch and convert every sticker of the set, then deliver size-bounded archives
    ///
    /// Items are processed one after another in set order. A failing item is logged,
    /// reported as [`Event::ItemFailed`] and skipped; only when no item converts at all
    /// does the job fail with [`Error::NothingConverted`].
    ///
    /// With `archive.include_sources`, payloads are downloaded straight into the output
    /// directory and archived with the converted files; otherwise they live in a separate
    /// directory and are deleted once converted.
    pub(super) async fn run_collection(
        &self,
        job: &Job,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let temp_dir = workspace.join(TEMP_DIR);
        tokio::fs::create_dir(&temp_dir).await?;
        let sources_dir = if self.config.archive.include_sources {
            temp_dir.clone()
        } else {
            let dir = workspace.join(SOURCES_DIR);
            tokio::fs::create_dir(&dir).await?;
            dir
        };

        let mut outcome = JobOutcome::default();
        let mut converted = 0usize;

        for item in &job.items {
            match self
                .process_item(job, item, &sources_dir, &temp_dir, cancel)
                .await
            {
                Ok(()) => converted += 1,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    error!(
                        session_id = %job.session_id,
                        item_index = item.index,
                        item = %item.item_ref,
                        error = %e,
                        detail = ?e,
                        "sticker failed, skipping"
                    );
                    outcome.failed_items += 1;
                    self.emit(Event::ItemFailed {
                        session_id: job.session_id,
                        index: item.index,
                        error: e.to_string(),
                    });
                }
            }
        }

        if converted == 0 {
            return Err(Error::NothingConverted {
                base_name: job.base_name.clone(),
            });
        }
        info!(
            session_id = %job.session_id,
            converted,
            failed = outcome.failed_items,
            "set converted"
        );

        check_cancelled(cancel)?;
        let bins = self.split(&temp_dir, &workspace.join(SPLIT_DIR)).await?;

        for bin in &bins {
            check_cancelled(cancel)?;
            let archive_path = workspace.join(format!("{}_dir_{}.zip", job.base_name, bin.index));
            let entries = entries_from_dir(&bin.dir)?;
            let count = entries.len();
            let archive = self.write_archive(archive_path, entries, cancel).await?;
            self.deliver_archive(job, &archive, count, cancel).await?;
            outcome.delivered += 1;
        }

        Ok(outcome)
    }

    /// Fetch one sticker of the set and convert it into every target format
    ///
    /// On failure, the payload and the outputs already written for this sticker are removed
    /// so that a half-converted sticker never ends up in an archive.
    async fn process_item(
        &self,
        job: &Job,
        item: &JobItem,
        sources_dir: &Path,
        temp_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let source = self.fetch(item, sources_dir, &job.base_name, cancel).await?;

        let mut written = Vec::with_capacity(job.format.targets().len());
        let mut failure = None;
        for &format in job.format.targets() {
            let result = match check_cancelled(cancel) {
                Ok(()) => {
                    self.converter
                        .convert(&source, temp_dir, &job.base_name, item.index, format)
                        .await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(output) => {
                    debug!(item_index = item.index, ?output, %format, "converted");
                    written.push(output);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let keep_source = failure.is_none() && self.config.archive.include_sources;
        if !keep_source {
            remove_quietly(&source).await;
        }
        match failure {
            None => Ok(()),
            Some(e) => {
                for output in &written {
                    remove_quietly(output).await;
                }
                Err(e)
            }
        }
    }

    async fn split(&self, temp_dir: &Path, split_dir: &Path) -> Result<Vec<ArchiveBin>> {
        let source: PathBuf = temp_dir.to_path_buf();
        let dest: PathBuf = split_dir.to_path_buf();
        let ceiling = self.config.archive.ceiling_bytes;
        tokio::task::spawn_blocking(move || split_into_bins(&source, &dest, ceiling))
            .await
            .map_err(|e| Error::Other(format!("split task failed: {}", e)))?
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(?path, error = %e, "failed to remove file");
    }
}
