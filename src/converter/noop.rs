//! LOTTIE-only converter for hosts without a renderer

use super::lottie::extract_lottie;
use super::traits::Converter;
use crate::types::TargetFormat;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Converter used when no external renderer is available
///
/// LOTTIE output only needs decompression and keeps working; PNG, WEBP and GIF return
/// `Error::NotSupported`, so a single-item job fails with a user-visible message and a
/// whole-collection job skips each item.
///
/// # Examples
///
/// ```
/// use sticker_dl::converter::{Converter, NoOpConverter};
/// use sticker_dl::types::TargetFormat;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let converter = NoOpConverter;
/// let result = converter
///     .convert(Path::new("set_1.tgs"), Path::new("out"), "set", 1, TargetFormat::Gif)
///     .await;
/// assert!(result.is_err());
/// # }
/// ```
pub struct NoOpConverter;

#[async_trait]
impl Converter for NoOpConverter {
    async fn convert(
        &self,
        source: &Path,
        target_dir: &Path,
        base_name: &str,
        index: usize,
        format: TargetFormat,
    ) -> crate::Result<PathBuf> {
        match format {
            TargetFormat::Lottie => extract_lottie(source, target_dir, base_name, index),
            other => Err(crate::Error::NotSupported(format!(
                "{} output requires an external lottie renderer. \
                 Configure converter.tool_path or ensure the tool is in PATH.",
                other
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
