//! Collaborator seams of the pipeline
//!
//! The chat transport and the remote sticker service live outside the core. The pipeline
//! talks to them only through these traits, so tests and embedders can plug in their own.

use crate::error::Result;
use crate::types::{CollectionRef, ItemRef, OutboundMessage, StickerItem};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Outbound side of the chat transport
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one message, text prompt or file to the user
    ///
    /// For [`OutboundMessage::File`] the call must not return before the file has been
    /// read, since the pipeline removes it right afterwards.
    async fn send(&self, message: OutboundMessage) -> Result<()>;
}

/// Source of raw sticker payloads
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// Download the payload of `item_ref` to `dest` and return the written path
    ///
    /// Always yields the source format; no conversion happens here. Transient failures
    /// should be reported as [`Error::Network`](crate::Error::Network) or
    /// [`Error::Remote`](crate::Error::Remote) so that they are retried.
    async fn fetch_payload(&self, item_ref: &ItemRef, dest: &Path) -> Result<PathBuf>;
}

/// Resolver of sticker sets
#[async_trait]
pub trait CollectionLookup: Send + Sync {
    /// List the items of a set, in set order
    async fn resolve_collection(&self, collection_ref: &CollectionRef) -> Result<Vec<StickerItem>>;
}
