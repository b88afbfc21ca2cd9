//! In-memory collaborators for driving the bot without a network or a renderer

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sticker_dl::converter::output_path;
use sticker_dl::{
    CollectionLookup, CollectionRef, Config, Converter, Error, ItemRef, MessageSink,
    OutboundMessage, PayloadSource, SessionId, StickerBot, StickerItem, TargetFormat,
};
use tempfile::TempDir;
use tokio::sync::Notify;

/// A file handed to the sink, captured before the pipeline deletes it
#[derive(Clone, Debug)]
pub struct SentFile {
    pub session_id: SessionId,
    pub display_name: String,
    pub bytes: Vec<u8>,
}

/// Sink that records every outbound message
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<OutboundMessage>>,
    files: Mutex<Vec<SentFile>>,
    failures_left: AtomicUsize,
}

impl RecordingSink {
    /// Refuse the next `count` messages without recording them
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn files(&self) -> Vec<SentFile> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, message: OutboundMessage) -> sticker_dl::Result<()> {
        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(Error::Delivery("chat unreachable".to_string()));
        }
        if let OutboundMessage::File {
            session_id,
            path,
            display_name,
        } = &message
        {
            let bytes = std::fs::read(path)?;
            self.files.lock().unwrap().push(SentFile {
                session_id: *session_id,
                display_name: display_name.clone(),
                bytes,
            });
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// How the scripted source answers for one item
#[derive(Clone, Debug)]
pub enum Payload {
    /// Write these bytes
    Bytes(Vec<u8>),
    /// Fail every attempt with a transient error
    AlwaysFail,
    /// Never answer
    Hang,
}

/// Payload source answering from a fixed script
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<HashMap<String, Payload>>,
    calls: Mutex<HashMap<String, usize>>,
    /// Notified whenever a fetch starts
    pub fetch_started: Notify,
}

impl ScriptedSource {
    pub fn with(self, item: &str, payload: Payload) -> Self {
        self.script.lock().unwrap().insert(item.to_string(), payload);
        self
    }

    pub fn calls(&self, item: &str) -> usize {
        self.calls.lock().unwrap().get(item).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PayloadSource for ScriptedSource {
    async fn fetch_payload(&self, item_ref: &ItemRef, dest: &Path) -> sticker_dl::Result<PathBuf> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(item_ref.as_str().to_string())
            .or_default() += 1;
        self.fetch_started.notify_one();

        let payload = self
            .script
            .lock()
            .unwrap()
            .get(item_ref.as_str())
            .cloned()
            .unwrap_or_else(|| Payload::Bytes(b"tgs".to_vec()));

        match payload {
            Payload::Bytes(bytes) => {
                tokio::fs::write(dest, bytes).await?;
                Ok(dest.to_path_buf())
            }
            Payload::AlwaysFail => Err(Error::Remote(format!("{} is unavailable", item_ref))),
            Payload::Hang => std::future::pending().await,
        }
    }
}

/// Lookup serving fixed sets
#[derive(Default)]
pub struct ScriptedLookup {
    sets: HashMap<String, Vec<StickerItem>>,
}

impl ScriptedLookup {
    pub fn with_set(mut self, name: &str, items: Vec<StickerItem>) -> Self {
        self.sets.insert(name.to_string(), items);
        self
    }
}

#[async_trait]
impl CollectionLookup for ScriptedLookup {
    async fn resolve_collection(
        &self,
        collection_ref: &CollectionRef,
    ) -> sticker_dl::Result<Vec<StickerItem>> {
        self.sets
            .get(collection_ref.as_str())
            .cloned()
            .ok_or_else(|| Error::Remote(format!("unknown set {}", collection_ref)))
    }
}

/// Animated items `{prefix}-1 ..= {prefix}-{count}`
pub fn animated_items(prefix: &str, count: usize) -> Vec<StickerItem> {
    (1..=count)
        .map(|i| StickerItem {
            item_ref: ItemRef(format!("{}-{}", prefix, i)),
            is_animated: true,
        })
        .collect()
}

/// Converter writing `size` bytes per output, named like the real one
#[derive(Default)]
pub struct SizedConverter {
    pub size: usize,
    pub fail_formats: HashSet<TargetFormat>,
    /// Formats reported as converted without writing anything
    pub unwritten_formats: HashSet<TargetFormat>,
    /// Time spent per conversion, not interrupted by cancellation
    pub delay: Duration,
    /// Notified whenever a conversion starts
    pub convert_started: Notify,
}

impl SizedConverter {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Converter for SizedConverter {
    async fn convert(
        &self,
        source: &Path,
        target_dir: &Path,
        base_name: &str,
        index: usize,
        format: TargetFormat,
    ) -> sticker_dl::Result<PathBuf> {
        if self.fail_formats.contains(&format) {
            return Err(Error::Convert(sticker_dl::ConvertError::Failed {
                source_path: source.to_path_buf(),
                format,
                reason: "scripted failure".to_string(),
            }));
        }
        self.convert_started.notify_one();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let output = output_path(target_dir, base_name, index, format);
        if !self.unwritten_formats.contains(&format) {
            tokio::fs::write(&output, vec![index as u8; self.size]).await?;
        }
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "sized"
    }
}

/// A bot wired to fakes, with its workspace root in a temp directory
pub struct TestBot {
    pub bot: StickerBot,
    pub sink: Arc<RecordingSink>,
    pub source: Arc<ScriptedSource>,
    pub root: PathBuf,
    _temp: TempDir,
}

/// Configuration with millisecond retry delays and the given archive ceiling
///
/// Payloads are kept out of set archives so that archive contents are exactly the
/// converter's outputs.
pub fn test_config(root: &Path, ceiling_bytes: u64) -> Config {
    let mut config = Config::default();
    config.workspace.root = root.to_path_buf();
    config.archive.ceiling_bytes = ceiling_bytes;
    config.archive.include_sources = false;
    config.retry.initial_delay = Duration::from_millis(1);
    config
}

pub fn test_bot(
    source: ScriptedSource,
    lookup: ScriptedLookup,
    converter: Arc<dyn Converter>,
    ceiling_bytes: u64,
) -> TestBot {
    test_bot_with(source, lookup, converter, |_| {}, ceiling_bytes)
}

/// Like [`test_bot`], with a hook to adjust the configuration
pub fn test_bot_with(
    source: ScriptedSource,
    lookup: ScriptedLookup,
    converter: Arc<dyn Converter>,
    adjust: impl FnOnce(&mut Config),
    ceiling_bytes: u64,
) -> TestBot {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("output_stickers");
    let sink = Arc::new(RecordingSink::default());
    let source = Arc::new(source);

    let mut config = test_config(&root, ceiling_bytes);
    adjust(&mut config);

    let bot = StickerBot::new(
        config,
        converter,
        source.clone(),
        Arc::new(lookup),
        sink.clone(),
    )
    .unwrap();

    TestBot {
        bot,
        sink,
        source,
        root,
        _temp: temp,
    }
}
