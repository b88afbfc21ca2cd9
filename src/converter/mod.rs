//! Sticker format conversion
//!
//! The codec itself lives outside this crate. This module defines the [`Converter`] seam
//! the pipeline calls for every (item, format) pair, plus two implementations:
//!
//! - [`CliConverter`]: runs an external lottie renderer for PNG/WEBP/GIF
//! - [`NoOpConverter`]: handles LOTTIE only, for hosts without a renderer
//!
//! LOTTIE output never touches pixel data: the gzip container of the source payload is
//! decompressed and the inner JSON document is delivered with a `.txt` extension. Both
//! implementations share that step through [`extract_lottie`].
//!
//! ## Usage
//!
//! ```no_run
//! use sticker_dl::converter::{CliConverter, Converter};
//! use sticker_dl::types::TargetFormat;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = CliConverter::from_path("lottie_convert.py")
//!         .expect("lottie_convert.py not found");
//!
//!     let gif = converter
//!         .convert(Path::new("set_1.tgs"), Path::new("out"), "set", 1, TargetFormat::Gif)
//!         .await?;
//!     println!("wrote {}", gif.display());
//!     Ok(())
//! }
//! ```

mod cli;
mod lottie;
mod noop;
mod traits;

pub use cli::CliConverter;
pub use lottie::extract_lottie;
pub use noop::NoOpConverter;
pub use traits::{Converter, output_path};

use crate::config::ConverterConfig;
use std::sync::Arc;
use tracing::warn;

/// Pick the converter for a configuration
///
/// Falls back to [`NoOpConverter`] (LOTTIE only) when no external tool can be located.
pub fn converter_from_config(config: &ConverterConfig) -> Arc<dyn Converter> {
    match CliConverter::from_config(config) {
        Ok(cli) => Arc::new(cli),
        Err(e) => {
            warn!(error = %e, "no conversion tool available, only LOTTIE output is supported");
            Arc::new(NoOpConverter)
        }
    }
}
