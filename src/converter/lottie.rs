//! LOTTIE extraction: gunzip the payload and rename the JSON to `.txt`

use super::traits::output_path;
use crate::error::{ConvertError, Error, Result};
use crate::types::TargetFormat;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Decompress a `.tgs` payload into `{base_name}_{index}.txt`
///
/// The inner document is first written as `.json`, then renamed to the text-document
/// convention used for delivery. A partial `.json` is removed on failure.
pub fn extract_lottie(
    source: &Path,
    target_dir: &Path,
    base_name: &str,
    index: usize,
) -> Result<PathBuf> {
    let failed = |reason: String| {
        Error::Convert(ConvertError::Failed {
            source_path: source.to_path_buf(),
            format: TargetFormat::Lottie,
            reason,
        })
    };

    let json_path = target_dir.join(format!("{}_{}.json", base_name, index));
    let lottie_path = output_path(target_dir, base_name, index, TargetFormat::Lottie);

    let input = File::open(source).map_err(|e| failed(format!("failed to open source: {}", e)))?;
    let mut decoder = GzDecoder::new(BufReader::new(input));

    let copied = File::create(&json_path)
        .and_then(|mut output| std::io::copy(&mut decoder, &mut output));
    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(e) => {
            std::fs::remove_file(&json_path).ok();
            return Err(failed(format!("failed to decompress: {}", e)));
        }
    };

    std::fs::rename(&json_path, &lottie_path)
        .map_err(|e| failed(format!("failed to rename {}: {}", json_path.display(), e)))?;

    debug!(?source, ?lottie_path, bytes, "extracted lottie document");
    Ok(lottie_path)
}
