//! # sticker-dl
//!
//! Core of a chat bot that downloads animated stickers, converts them and sends them back
//! packaged in size-bounded ZIP archives.
//!
//! ## Design Philosophy
//!
//! sticker-dl is designed to be:
//! - **Transport-agnostic** - the chat protocol plugs in through [`MessageSink`] and
//!   [`InboundEvent`]s, no messenger SDK is baked in
//! - **Sensible defaults** - works out of the box with a bot token and a converter on PATH
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - consumers subscribe to job events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sticker_dl::{Config, InboundEvent, MessageSink, OutboundMessage, SessionId, StickerBot};
//!
//! struct StdoutSink;
//!
//! #[async_trait::async_trait]
//! impl MessageSink for StdoutSink {
//!     async fn send(&self, message: OutboundMessage) -> sticker_dl::Result<()> {
//!         println!("{:?}", message);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.remote.token = Some("123456:ABC".to_string());
//!
//!     let bot = StickerBot::with_remote(config, Arc::new(StdoutSink))?;
//!
//!     // Subscribe to events
//!     let mut events = bot.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     bot.handle_event(InboundEvent::SessionStarted { session_id: SessionId(1) })
//!         .await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive building and size-bounded splitting
pub mod archive;
/// Event dispatcher and job supervision
pub mod bot;
/// Configuration types
pub mod config;
/// Sticker format conversion
pub mod converter;
/// Error types
pub mod error;
/// Download, convert and package jobs
pub mod pipeline;
/// HTTP client for the remote sticker service
pub mod remote;
/// Retry logic with exponential backoff
pub mod retry;
/// Per-conversation selection state
pub mod session;
/// Core types and events
pub mod types;
/// Per-job scratch directories
pub mod workspace;

// Re-export commonly used types
pub use bot::StickerBot;
pub use config::Config;
pub use converter::{CliConverter, Converter, NoOpConverter};
pub use error::{ArchiveError, ConvertError, Error, Result, WorkspaceError};
pub use pipeline::{CollectionLookup, MessageSink, PayloadSource, Pipeline};
pub use remote::BotApiClient;
pub use session::{Session, SessionState};
pub use types::{
    ChoiceOption, ChoiceToken, CollectionRef, Event, FormatChoice, InboundEvent, ItemRef,
    OutboundMessage, Scope, SessionId, StickerItem, TargetFormat,
};

/// Run the bot until a termination signal arrives, then shut it down gracefully.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The transport keeps feeding events to a clone of `bot` while this future is pending.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use sticker_dl::{Config, MessageSink, StickerBot, run_with_shutdown};
/// # async fn example(sink: Arc<dyn MessageSink>) -> sticker_dl::Result<()> {
/// let bot = StickerBot::with_remote(Config::default(), sink)?;
///
/// // Hand `bot.clone()` to the transport, then block until SIGTERM/SIGINT
/// run_with_shutdown(bot).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(bot: StickerBot) -> Result<()> {
    wait_for_signal().await;
    bot.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "Could not register both signal handlers, waiting for the other one");
            only.recv().await;
            tracing::info!("Received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
