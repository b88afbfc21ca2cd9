//! The converter seam

use crate::types::TargetFormat;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Converts one source payload into one target format
///
/// Calls share no state: each call reads `source` and writes exactly one file into
/// `target_dir`, named by [`output_path`]. The pipeline never runs two conversions of
/// the same source concurrently.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `source` into `format`, returning the written file
    async fn convert(
        &self,
        source: &Path,
        target_dir: &Path,
        base_name: &str,
        index: usize,
        format: TargetFormat,
    ) -> crate::Result<PathBuf>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// File a conversion of item `index` into `format` is written to
pub fn output_path(target_dir: &Path, base_name: &str, index: usize, format: TargetFormat) -> PathBuf {
    target_dir.join(format!("{}_{}.{}", base_name, index, format.extension()))
}
