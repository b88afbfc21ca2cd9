//! Event dispatcher tying sessions to jobs
//!
//! [`StickerBot`] owns one [`Session`] per conversation in a map keyed by [`SessionId`].
//! Inbound events are applied to the session under the map lock; replies are sent and jobs
//! are spawned after the lock is released, so a running job never blocks other sessions or
//! a `/stop` for its own session.
//!
//! Running jobs are tracked in a registry separate from the sessions: a reset detaches a
//! job from its session immediately, but the job stays registered until its task has
//! released the workspace. Idle sessions without a job are dropped from the map.
//!
//! Lock order is sessions, then jobs.

use crate::config::Config;
use crate::converter::{Converter, converter_from_config};
use crate::error::{Error, Result};
use crate::pipeline::{CollectionLookup, MessageSink, PayloadSource, Pipeline};
use crate::remote::BotApiClient;
use crate::session::{Action, JobRequest, Session, SessionState};
use crate::types::{Event, InboundEvent, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

/// How long `shutdown` waits for cancelled jobs to clean up
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

struct SessionEntry {
    session: Session,
    /// Id of the job attached to this session
    job: Option<u64>,
}

impl SessionEntry {
    fn is_disposable(&self) -> bool {
        self.job.is_none() && self.session.state() == SessionState::Idle
    }
}

/// The sticker bot core (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct StickerBot {
    pipeline: Pipeline,
    sink: Arc<dyn MessageSink>,
    sessions: Arc<Mutex<HashMap<SessionId, SessionEntry>>>,
    /// Every spawned job until its task ends, attached or not
    jobs: Arc<Mutex<HashMap<u64, CancellationToken>>>,
    event_tx: broadcast::Sender<Event>,
    /// Cleared during shutdown
    accepting_new: Arc<AtomicBool>,
    next_job_id: Arc<AtomicU64>,
}

impl StickerBot {
    /// Create a bot from explicit collaborators
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the configuration is invalid.
    pub fn new(
        config: Config,
        converter: Arc<dyn Converter>,
        source: Arc<dyn PayloadSource>,
        lookup: Arc<dyn CollectionLookup>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(1000);
        let pipeline = Pipeline::new(
            Arc::new(config),
            converter,
            source,
            lookup,
            sink.clone(),
            event_tx.clone(),
        );

        Ok(Self {
            pipeline,
            sink,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
            next_job_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Create a bot that fetches from the configured remote service and converts with the
    /// configured tool
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the configuration is invalid or has no bot token.
    pub fn with_remote(config: Config, sink: Arc<dyn MessageSink>) -> Result<Self> {
        let client = Arc::new(BotApiClient::new(&config.remote)?);
        let converter = converter_from_config(&config.converter);
        Self::new(config, converter, client.clone(), client, sink)
    }

    /// Subscribe to job events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The pipeline jobs run on
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Handle one inbound event
    ///
    /// Returns once the replies have been handed to the sink; a job started by the event
    /// keeps running in its own task. The session has moved on even if a reply could not
    /// be delivered: the failure is logged and the transport is expected to re-prompt.
    ///
    /// # Errors
    /// Returns [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let session_id = event.session_id();

        let mut replies = Vec::new();
        let mut start = None;
        {
            let mut sessions = self.sessions.lock().await;
            let entry = sessions.entry(session_id).or_insert_with(|| SessionEntry {
                session: Session::new(session_id),
                job: None,
            });

            for action in entry.session.apply(&event) {
                match action {
                    Action::Reply(message) => replies.push(message),
                    Action::CancelJob => {
                        if let Some(job_id) = entry.job.take() {
                            tracing::info!(%session_id, job_id, "cancelling job");
                            if let Some(cancel) = self.jobs.lock().await.get(&job_id) {
                                cancel.cancel();
                            }
                        }
                    }
                    Action::StartJob(request) => {
                        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
                        let cancel = CancellationToken::new();
                        self.jobs.lock().await.insert(job_id, cancel.clone());
                        entry.job = Some(job_id);
                        start = Some((job_id, cancel, request));
                    }
                }
            }

            if entry.is_disposable() {
                sessions.remove(&session_id);
            }
        } // Release lock

        for message in replies {
            if let Err(e) = self.sink.send(message).await {
                tracing::warn!(%session_id, error = %e, "failed to deliver reply");
            }
        }

        if let Some((job_id, cancel, request)) = start {
            self.spawn_job(job_id, cancel, request);
        }
        Ok(())
    }

    fn spawn_job(&self, job_id: u64, cancel: CancellationToken, request: JobRequest) {
        let bot = self.clone();
        tokio::spawn(async move {
            let session_id = request.session_id;
            tracing::debug!(%session_id, job_id, "job task started");

            // The pipeline reports its own outcome to the user and the event channel
            let _ = bot.pipeline.execute(&request, &cancel).await;

            bot.finish_job(session_id, job_id).await;
        });
    }

    async fn finish_job(&self, session_id: SessionId, job_id: u64) {
        {
            let mut sessions = self.sessions.lock().await;
            if let Some(entry) = sessions.get_mut(&session_id) {
                // A reset may have detached this job already
                if entry.job == Some(job_id) {
                    entry.job = None;
                    entry.session.finish_job();
                }
                if entry.is_disposable() {
                    sessions.remove(&session_id);
                }
            }
        }
        self.jobs.lock().await.remove(&job_id);
        tracing::debug!(%session_id, job_id, "job task finished");
    }

    /// Number of job tasks still running, including jobs already detached by a reset
    pub async fn active_jobs(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Number of conversations with state worth keeping (a selection or a running job)
    pub async fn tracked_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Gracefully shut down the bot
    ///
    /// Stops accepting events, cancels every running job and waits (up to 30 seconds)
    /// for their workspaces to be cleaned up.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");
        self.accepting_new.store(false, Ordering::SeqCst);

        {
            let jobs = self.jobs.lock().await;
            for (job_id, cancel) in jobs.iter() {
                tracing::debug!(job_id, "cancelling job for shutdown");
                cancel.cancel();
            }
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All jobs stopped"),
            Err(_) => tracing::warn!("Timeout waiting for jobs to stop, proceeding with shutdown"),
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.active_jobs().await;
            if active_count == 0 {
                return;
            }
            tracing::debug!(active_count, "Waiting for active jobs to stop");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
