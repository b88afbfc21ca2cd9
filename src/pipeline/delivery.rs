//! Sending results and removing them from the workspace

use super::{Job, Pipeline, check_cancelled};
use crate::archive::{ArchiveEntry, build_archive};
use crate::error::{Error, Result};
use crate::types::{Event, OutboundMessage};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl Pipeline {
    /// Send a converted file as-is, then delete it
    pub(super) async fn deliver_file(
        &self,
        job: &Job,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = self.send_and_remove(job, path, cancel).await?;
        self.emit(Event::FileDelivered {
            session_id: job.session_id,
            name,
        });
        Ok(())
    }

    /// Send an archive, then delete it
    pub(super) async fn deliver_archive(
        &self,
        job: &Job,
        path: &Path,
        entries: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = self.send_and_remove(job, path, cancel).await?;
        info!(session_id = %job.session_id, archive = %name, entries, "archive delivered");
        self.emit(Event::ArchiveDelivered {
            session_id: job.session_id,
            name,
            entries,
        });
        Ok(())
    }

    /// Write an archive on the blocking pool
    pub(super) async fn write_archive(
        &self,
        archive_path: PathBuf,
        entries: Vec<ArchiveEntry>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        check_cancelled(cancel)?;
        let compression = self.config.archive.compression;
        tokio::task::spawn_blocking(move || build_archive(&archive_path, &entries, compression))
            .await
            .map_err(|e| Error::Other(format!("archive task failed: {}", e)))?
    }

    async fn send_and_remove(
        &self,
        job: &Job,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<String> {
        check_cancelled(cancel)?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Delivery(format!("{} has no file name", path.display())))?;

        self.sink
            .send(OutboundMessage::File {
                session_id: job.session_id,
                path: path.to_path_buf(),
                display_name: display_name.clone(),
            })
            .await?;
        debug!(session_id = %job.session_id, file = %display_name, "sent");

        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(?path, error = %e, "failed to remove delivered file");
        }
        Ok(display_name)
    }
}
