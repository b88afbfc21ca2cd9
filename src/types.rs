//! Core types for sticker-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Identifier of one conversation with the bot
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to one sticker payload on the remote service
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemRef(pub String);

impl ItemRef {
    /// Borrow the reference as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a sticker collection (set)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionRef(pub String);

impl CollectionRef {
    /// Borrow the reference as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CollectionRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a resolved collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerItem {
    /// Payload reference
    pub item_ref: ItemRef,
    /// Whether the sticker is an animated (lottie) sticker
    pub is_animated: bool,
}

/// A single output format produced by the converter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// First frame as PNG
    Png,
    /// First frame as WEBP
    Webp,
    /// Full animation as GIF
    Gif,
    /// Decompressed lottie JSON, delivered as a text document
    Lottie,
}

impl TargetFormat {
    /// File extension of the converted output
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
            TargetFormat::Gif => "gif",
            TargetFormat::Lottie => "txt",
        }
    }

    /// Whether the output is a single still frame
    pub fn is_still(&self) -> bool {
        matches!(self, TargetFormat::Png | TargetFormat::Webp)
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
            TargetFormat::Gif => "gif",
            TargetFormat::Lottie => "lottie",
        };
        f.write_str(name)
    }
}

/// How converted outputs reach the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packaging {
    /// The converted file is sent as-is
    Direct,
    /// The converted files are zipped, even when there is only one
    Zip,
}

/// Format the user picked from the format prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    /// PNG only
    Png,
    /// WEBP only
    Webp,
    /// GIF only
    Gif,
    /// Lottie only
    Lottie,
    /// Every target format
    All,
}

impl FormatChoice {
    /// Every choice, in prompt order
    pub const ALL_CHOICES: [FormatChoice; 5] = [
        FormatChoice::Png,
        FormatChoice::Webp,
        FormatChoice::Gif,
        FormatChoice::Lottie,
        FormatChoice::All,
    ];

    /// Target formats produced for each item, in conversion order
    pub fn targets(&self) -> &'static [TargetFormat] {
        match self {
            FormatChoice::Png => &[TargetFormat::Png],
            FormatChoice::Webp => &[TargetFormat::Webp],
            FormatChoice::Gif => &[TargetFormat::Gif],
            FormatChoice::Lottie => &[TargetFormat::Lottie],
            FormatChoice::All => &[
                TargetFormat::Gif,
                TargetFormat::Png,
                TargetFormat::Webp,
                TargetFormat::Lottie,
            ],
        }
    }

    /// Packaging used when delivering a single-item job
    ///
    /// PNG and LOTTIE go out raw while GIF, WEBP and ALL are always zipped.
    pub fn packaging(&self) -> Packaging {
        match self {
            FormatChoice::Png | FormatChoice::Lottie => Packaging::Direct,
            FormatChoice::Webp | FormatChoice::Gif | FormatChoice::All => Packaging::Zip,
        }
    }

    /// Button label shown in the format prompt
    pub fn label(&self) -> &'static str {
        match self {
            FormatChoice::Png => "PNG",
            FormatChoice::Webp => "WEBP",
            FormatChoice::Gif => "GIF",
            FormatChoice::Lottie => "LOTTIE",
            FormatChoice::All => "Download All",
        }
    }
}

impl std::fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormatChoice::Png => "png",
            FormatChoice::Webp => "webp",
            FormatChoice::Gif => "gif",
            FormatChoice::Lottie => "lottie",
            FormatChoice::All => "all",
        };
        f.write_str(name)
    }
}

/// Whether a job covers one sticker or its whole set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only the sticker that was sent
    SingleItem,
    /// Every sticker of the sticker's set
    WholeCollection,
}

impl Scope {
    /// Button label shown in the scope prompt
    pub fn label(&self) -> &'static str {
        match self {
            Scope::SingleItem => "Just this one",
            Scope::WholeCollection => "Whole set",
        }
    }
}

/// Callback token attached to a prompt button
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChoiceToken {
    /// `scope:single` / `scope:whole`
    Scope(Scope),
    /// `format:png|webp|gif|lottie|all`
    Format(FormatChoice),
}

/// A callback token that does not name any known choice
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown choice token '{0}'")]
pub struct UnknownToken(pub String);

impl std::str::FromStr for ChoiceToken {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = match s {
            "scope:single" => ChoiceToken::Scope(Scope::SingleItem),
            "scope:whole" => ChoiceToken::Scope(Scope::WholeCollection),
            "format:png" => ChoiceToken::Format(FormatChoice::Png),
            "format:webp" => ChoiceToken::Format(FormatChoice::Webp),
            "format:gif" => ChoiceToken::Format(FormatChoice::Gif),
            "format:lottie" => ChoiceToken::Format(FormatChoice::Lottie),
            "format:all" => ChoiceToken::Format(FormatChoice::All),
            other => return Err(UnknownToken(other.to_string())),
        };
        Ok(token)
    }
}

impl std::fmt::Display for ChoiceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChoiceToken::Scope(Scope::SingleItem) => f.write_str("scope:single"),
            ChoiceToken::Scope(Scope::WholeCollection) => f.write_str("scope:whole"),
            ChoiceToken::Format(format) => write!(f, "format:{}", format),
        }
    }
}

/// One button of a choice prompt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceOption {
    /// Text on the button
    pub label: String,
    /// Token sent back when the button is pressed
    pub token: ChoiceToken,
}

impl From<Scope> for ChoiceOption {
    fn from(scope: Scope) -> Self {
        Self {
            label: scope.label().to_string(),
            token: ChoiceToken::Scope(scope),
        }
    }
}

impl From<FormatChoice> for ChoiceOption {
    fn from(format: FormatChoice) -> Self {
        Self {
            label: format.label().to_string(),
            token: ChoiceToken::Format(format),
        }
    }
}

/// Event delivered by the chat transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// The user opened a new conversation (`/start`)
    SessionStarted {
        /// Conversation
        session_id: SessionId,
    },
    /// The user sent a sticker
    ItemReceived {
        /// Conversation
        session_id: SessionId,
        /// Payload reference of the sticker
        item_ref: ItemRef,
        /// Whether the sticker is animated
        is_animated: bool,
        /// Set the sticker belongs to, if any
        collection_ref: Option<CollectionRef>,
    },
    /// The user pressed a prompt button
    ButtonSelected {
        /// Conversation
        session_id: SessionId,
        /// Raw callback token
        token: String,
    },
    /// The user asked to stop (`/stop`)
    SessionReset {
        /// Conversation
        session_id: SessionId,
    },
}

impl InboundEvent {
    /// Conversation the event belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            InboundEvent::SessionStarted { session_id }
            | InboundEvent::ItemReceived { session_id, .. }
            | InboundEvent::ButtonSelected { session_id, .. }
            | InboundEvent::SessionReset { session_id } => *session_id,
        }
    }
}

/// Message handed to the chat transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Plain text
    Text {
        /// Conversation
        session_id: SessionId,
        /// Message text
        text: String,
    },
    /// Text with a row of choice buttons
    ChoicePrompt {
        /// Conversation
        session_id: SessionId,
        /// Prompt text
        text: String,
        /// Buttons, in display order
        options: Vec<ChoiceOption>,
    },
    /// A document upload
    File {
        /// Conversation
        session_id: SessionId,
        /// File on local disk
        path: PathBuf,
        /// File name shown to the user
        display_name: String,
    },
}

impl OutboundMessage {
    /// Build a plain text message
    pub fn text(session_id: SessionId, text: impl Into<String>) -> Self {
        OutboundMessage::Text {
            session_id,
            text: text.into(),
        }
    }
}

/// Event emitted during job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was materialized from a completed selection
    JobStarted {
        /// Conversation
        session_id: SessionId,
        /// Base name used for files and archives
        base_name: String,
        /// Scope of the job
        scope: Scope,
        /// Chosen format
        format: FormatChoice,
        /// Number of items the job will process
        items: usize,
    },

    /// One item of a whole-collection job failed and was skipped
    ItemFailed {
        /// Conversation
        session_id: SessionId,
        /// 1-based collection index
        index: usize,
        /// Error message
        error: String,
    },

    /// A raw converted file was delivered
    FileDelivered {
        /// Conversation
        session_id: SessionId,
        /// Delivered file name
        name: String,
    },

    /// An archive was delivered
    ArchiveDelivered {
        /// Conversation
        session_id: SessionId,
        /// Archive file name
        name: String,
        /// Number of entries in the archive
        entries: usize,
    },

    /// The job finished
    JobComplete {
        /// Conversation
        session_id: SessionId,
        /// Number of files or archives delivered
        delivered: usize,
        /// Number of items skipped after failing
        failed_items: usize,
    },

    /// The job aborted
    JobFailed {
        /// Conversation
        session_id: SessionId,
        /// Error message
        error: String,
    },

    /// The job was cancelled before finishing
    JobCancelled {
        /// Conversation
        session_id: SessionId,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_and_display_symmetrically() {
        for raw in [
            "scope:single",
            "scope:whole",
            "format:png",
            "format:webp",
            "format:gif",
            "format:lottie",
            "format:all",
        ] {
            let token: ChoiceToken = raw.parse().unwrap();
            assert_eq!(token.to_string(), raw);
        }
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = "format:bmp".parse::<ChoiceToken>().unwrap_err();
        assert_eq!(err, UnknownToken("format:bmp".to_string()));
        assert!("just_one".parse::<ChoiceToken>().is_err());
    }

    #[test]
    fn packaging_policy_matches_delivery_table() {
        assert_eq!(FormatChoice::Png.packaging(), Packaging::Direct);
        assert_eq!(FormatChoice::Lottie.packaging(), Packaging::Direct);
        assert_eq!(FormatChoice::Webp.packaging(), Packaging::Zip);
        assert_eq!(FormatChoice::Gif.packaging(), Packaging::Zip);
        assert_eq!(FormatChoice::All.packaging(), Packaging::Zip);
    }

    #[test]
    fn all_expands_to_four_targets() {
        let targets = FormatChoice::All.targets();
        assert_eq!(targets.len(), 4);
        for format in [
            TargetFormat::Png,
            TargetFormat::Webp,
            TargetFormat::Gif,
            TargetFormat::Lottie,
        ] {
            assert!(targets.contains(&format));
        }
    }

    #[test]
    fn lottie_is_delivered_as_text_document() {
        assert_eq!(TargetFormat::Lottie.extension(), "txt");
        assert!(!TargetFormat::Lottie.is_still());
        assert!(TargetFormat::Png.is_still());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::ItemFailed {
            session_id: SessionId(7),
            index: 3,
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_failed");
        assert_eq!(json["session_id"], 7);
        assert_eq!(json["index"], 3);
    }
}
