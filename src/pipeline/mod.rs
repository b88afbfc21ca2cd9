//! Download, convert and package jobs
//!
//! A [`Pipeline`] turns a completed [`JobRequest`] into delivered files:
//! - [`single`] - one sticker, delivered raw (PNG, LOTTIE) or as `{base}.zip`
//! - [`collection`] - a whole set, split into size-bounded `{base}_dir_{n}.zip` archives
//! - [`delivery`] - sending files through the [`MessageSink`] and removing them afterwards
//!
//! Every job owns a fresh workspace directory that is removed when the job ends, whether it
//! succeeded, failed or was cancelled. Cancellation is cooperative: the job's
//! [`CancellationToken`] is checked before every fetch, conversion, archive and delivery step.

mod collection;
mod delivery;
mod single;
mod traits;

pub use traits::{CollectionLookup, MessageSink, PayloadSource};

use crate::config::Config;
use crate::converter::Converter;
use crate::error::{Error, Result};
use crate::retry::execute_with_retry;
use crate::session::JobRequest;
use crate::types::{Event, FormatChoice, ItemRef, OutboundMessage, Scope, SessionId};
use crate::workspace::{WorkspaceManager, sanitize_base_name};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Base name of jobs whose sticker has no set
pub const DEFAULT_BASE_NAME: &str = "sticker";

/// One item of a job, with its 1-based position in the set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobItem {
    /// Position used in file names (`{base}_{index}.*`)
    pub index: usize,
    /// Payload reference
    pub item_ref: ItemRef,
}

/// A materialized unit of work
#[derive(Clone, Debug)]
pub struct Job {
    /// Conversation the job reports to
    pub session_id: SessionId,
    /// Name prefix of every file and archive the job produces
    pub base_name: String,
    /// Single sticker or whole set
    pub scope: Scope,
    /// Chosen output format
    pub format: FormatChoice,
    /// Items to process, in set order
    pub items: Vec<JobItem>,
}

/// Counters of a finished job
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobOutcome {
    /// Files or archives delivered
    pub delivered: usize,
    /// Items skipped after failing
    pub failed_items: usize,
}

/// Runs jobs against the configured collaborators
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) config: Arc<Config>,
    pub(crate) workspace: WorkspaceManager,
    pub(crate) converter: Arc<dyn Converter>,
    pub(crate) source: Arc<dyn PayloadSource>,
    pub(crate) lookup: Arc<dyn CollectionLookup>,
    pub(crate) sink: Arc<dyn MessageSink>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl Pipeline {
    /// Create a pipeline
    pub fn new(
        config: Arc<Config>,
        converter: Arc<dyn Converter>,
        source: Arc<dyn PayloadSource>,
        lookup: Arc<dyn CollectionLookup>,
        sink: Arc<dyn MessageSink>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        let workspace = WorkspaceManager::new(config.workspace.root.clone());
        Self {
            config,
            workspace,
            converter,
            source,
            lookup,
            sink,
            event_tx,
        }
    }

    /// Workspace manager used for job directories
    pub fn workspace(&self) -> &WorkspaceManager {
        &self.workspace
    }

    /// Run a job to completion and report the result to the user
    ///
    /// Sends the progress text, runs the job for the request's scope, always releases the
    /// workspace, and emits the final [`Event`]. Job-fatal errors are answered with
    /// [`Error::user_message`]; a cancelled job sends nothing, since the reset that
    /// cancelled it has already been answered.
    pub async fn execute(&self, request: &JobRequest, cancel: &CancellationToken) -> Result<JobOutcome> {
        let session_id = request.session_id;
        let result = self.run(request, cancel).await;

        match &result {
            Ok(outcome) => {
                info!(
                    %session_id,
                    delivered = outcome.delivered,
                    failed_items = outcome.failed_items,
                    "job complete"
                );
                self.emit(Event::JobComplete {
                    session_id,
                    delivered: outcome.delivered,
                    failed_items: outcome.failed_items,
                });
            }
            Err(Error::Cancelled) => {
                info!(%session_id, "job cancelled");
                self.emit(Event::JobCancelled { session_id });
            }
            Err(e) => {
                error!(%session_id, error = %e, detail = ?e, "job failed");
                self.emit(Event::JobFailed {
                    session_id,
                    error: e.to_string(),
                });
                if let Err(send_err) = self
                    .sink
                    .send(OutboundMessage::text(session_id, e.user_message()))
                    .await
                {
                    warn!(%session_id, error = %send_err, "failed to send failure message");
                }
            }
        }

        result
    }

    async fn run(&self, request: &JobRequest, cancel: &CancellationToken) -> Result<JobOutcome> {
        check_cancelled(cancel)?;
        self.sink
            .send(OutboundMessage::text(request.session_id, start_text(request)))
            .await?;

        let job = self.prepare(request, cancel).await?;
        self.emit(Event::JobStarted {
            session_id: job.session_id,
            base_name: job.base_name.clone(),
            scope: job.scope,
            format: job.format,
            items: job.items.len(),
        });

        check_cancelled(cancel)?;
        let workspace = self.workspace.allocate(&job.base_name).await?;
        info!(
            session_id = %job.session_id,
            ?workspace,
            items = job.items.len(),
            format = %job.format,
            "job started"
        );

        let result = match job.scope {
            Scope::SingleItem => self.run_single(&job, &workspace, cancel).await,
            Scope::WholeCollection => self.run_collection(&job, &workspace, cancel).await,
        };

        if let Err(e) = self.workspace.release(&workspace).await {
            error!(session_id = %job.session_id, ?workspace, error = %e, "workspace cleanup failed");
        }

        result
    }

    /// Materialize the job for a request, resolving the set for whole-set jobs
    async fn prepare(&self, request: &JobRequest, cancel: &CancellationToken) -> Result<Job> {
        let base_name = request
            .collection_ref
            .as_ref()
            .map(|c| sanitize_base_name(c.as_str()))
            .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string());

        let items = match request.scope {
            Scope::SingleItem => vec![JobItem {
                index: 1,
                item_ref: request.item_ref.clone(),
            }],
            Scope::WholeCollection => {
                let collection_ref = request.collection_ref.as_ref().ok_or_else(|| {
                    Error::Other("whole-set job without a set reference".to_string())
                })?;
                check_cancelled(cancel)?;
                let stickers = self.lookup.resolve_collection(collection_ref).await?;
                let total = stickers.len();
                let items: Vec<JobItem> = stickers
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, sticker)| {
                        if sticker.is_animated {
                            Some(JobItem {
                                index: i + 1,
                                item_ref: sticker.item_ref,
                            })
                        } else {
                            debug!(collection = %collection_ref, index = i + 1, "skipping non-animated sticker");
                            None
                        }
                    })
                    .collect();
                debug!(collection = %collection_ref, total, animated = items.len(), "resolved set");
                items
            }
        };

        Ok(Job {
            session_id: request.session_id,
            base_name,
            scope: request.scope,
            format: request.format,
            items,
        })
    }

    /// Fetch the payload of `item` into `dir` as `{base}_{index}.tgs`, with retry
    ///
    /// The backoff sleeps are interrupted by cancellation.
    pub(crate) async fn fetch(
        &self,
        item: &JobItem,
        dir: &Path,
        base_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        check_cancelled(cancel)?;
        let dest = dir.join(format!("{}_{}.tgs", base_name, item.index));
        let fetch = execute_with_retry(&self.config.retry, "fetch_payload", || {
            self.source.fetch_payload(&item.item_ref, &dest)
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = fetch => result,
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

/// Fail with [`Error::Cancelled`] once the job's token has been cancelled
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

fn start_text(request: &JobRequest) -> String {
    match (request.scope, &request.collection_ref) {
        (Scope::WholeCollection, Some(collection)) => format!(
            "Downloading the whole set '{}' in {} format...",
            collection, request.format
        ),
        _ => format!("Downloading the sticker in {} format...", request.format),
    }
}
