//! Event waits and filesystem assertions for integration tests

use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;
use sticker_dl::{CollectionRef, Event, InboundEvent, ItemRef, SessionId, StickerBot};
use tokio::sync::broadcast;

/// Default time budget for one job in tests
pub const JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for the terminal event of the next job of `session_id`
///
/// Returns the `JobComplete`, `JobFailed` or `JobCancelled` event, plus every event seen
/// for the session on the way.
pub async fn wait_for_job_end(
    events: &mut broadcast::Receiver<Event>,
    session_id: SessionId,
) -> (Event, Vec<Event>) {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(JOB_TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            let id = match &event {
                Event::JobStarted { session_id, .. }
                | Event::ItemFailed { session_id, .. }
                | Event::FileDelivered { session_id, .. }
                | Event::ArchiveDelivered { session_id, .. }
                | Event::JobComplete { session_id, .. }
                | Event::JobFailed { session_id, .. }
                | Event::JobCancelled { session_id } => *session_id,
            };
            if id != session_id {
                continue;
            }
            match event {
                Event::JobComplete { .. } | Event::JobFailed { .. } | Event::JobCancelled { .. } => {
                    return event;
                }
                other => seen.push(other),
            }
        }
    })
    .await;

    match result {
        Ok(end) => (end, seen),
        Err(_) => panic!("timeout waiting for job of session {session_id} to end"),
    }
}

/// Wait until the bot has no running job
pub async fn wait_until_idle(bot: &StickerBot) {
    tokio::time::timeout(JOB_TIMEOUT, async {
        while bot.active_jobs().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("jobs did not finish");
}

/// Walk through sticker -> scope -> format for one session
pub async fn select(
    bot: &StickerBot,
    session_id: SessionId,
    item: &str,
    collection: Option<&str>,
    scope_token: &str,
    format_token: &str,
) {
    bot.handle_event(InboundEvent::ItemReceived {
        session_id,
        item_ref: ItemRef::from(item),
        is_animated: true,
        collection_ref: collection.map(CollectionRef::from),
    })
    .await
    .unwrap();
    for token in [scope_token, format_token] {
        bot.handle_event(InboundEvent::ButtonSelected {
            session_id,
            token: token.to_string(),
        })
        .await
        .unwrap();
    }
}

/// Assert the workspace root holds no job directory
pub fn assert_workspace_root_empty(root: &Path) {
    if !root.exists() {
        return;
    }
    let leftovers: Vec<_> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.path().to_path_buf())
        .collect();
    assert!(leftovers.is_empty(), "workspace not cleaned up: {leftovers:?}");
}

/// Names and contents of the entries of an in-memory archive, in archive order
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("not a zip archive");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}
