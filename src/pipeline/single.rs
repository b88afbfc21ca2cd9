//! Single-sticker jobs

use super::{Job, JobOutcome, Pipeline, check_cancelled};
use crate::archive::ArchiveEntry;
use crate::error::{Error, Result};
use crate::types::Packaging;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

impl Pipeline {
    /// Fetch one sticker, convert it and deliver the result
    ///
    /// Any failure is fatal for the job. PNG and LOTTIE outputs are sent raw; every other
    /// choice is zipped into `{base}.zip`, even when it holds a single file.
    pub(super) async fn run_single(
        &self,
        job: &Job,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let item = job
            .items
            .first()
            .ok_or_else(|| Error::Other("single-sticker job without an item".to_string()))?;

        let source = self.fetch(item, workspace, &job.base_name, cancel).await?;

        let mut outputs = Vec::with_capacity(job.format.targets().len());
        for &format in job.format.targets() {
            check_cancelled(cancel)?;
            let output = self
                .converter
                .convert(&source, workspace, &job.base_name, item.index, format)
                .await?;
            debug!(session_id = %job.session_id, ?output, %format, "converted");
            outputs.push(output);
        }

        if let Err(e) = tokio::fs::remove_file(&source).await {
            warn!(?source, error = %e, "failed to remove source payload");
        }

        let mut outcome = JobOutcome::default();
        match job.format.packaging() {
            Packaging::Direct => {
                for output in &outputs {
                    self.deliver_file(job, output, cancel).await?;
                    outcome.delivered += 1;
                }
            }
            Packaging::Zip => {
                let entries: Vec<ArchiveEntry> = outputs.iter().map(ArchiveEntry::flat).collect();
                let count = entries.len();
                let archive_path = workspace.join(format!("{}.zip", job.base_name));
                let archive = self.write_archive(archive_path, entries, cancel).await?;
                self.deliver_archive(job, &archive, count, cancel).await?;
                outcome.delivered += 1;

                for output in &outputs {
                    if let Err(e) = tokio::fs::remove_file(output).await {
                        warn!(?output, error = %e, "failed to remove converted file");
                    }
                }
            }
        }

        Ok(outcome)
    }
}
