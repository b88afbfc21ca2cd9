//! CLI-based converter using an external lottie renderer

use super::lottie::extract_lottie;
use super::traits::{Converter, output_path};
use crate::config::ConverterConfig;
use crate::error::{ConvertError, Error};
use crate::types::TargetFormat;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Converter that shells out to a lottie renderer such as `lottie_convert.py`
///
/// The tool is invoked as `<tool> [still_frame_args] <source> <output>`; the output
/// format is selected by the output file extension. Still formats (PNG, WEBP) get
/// `still_frame_args` so that only the first frame is rendered. LOTTIE output is
/// produced in-process and never calls the tool.
///
/// # Examples
///
/// ```no_run
/// use sticker_dl::converter::{CliConverter, Converter};
/// use sticker_dl::types::TargetFormat;
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = CliConverter::new(PathBuf::from("/usr/local/bin/lottie_convert.py"));
/// let png = converter
///     .convert(Path::new("set_1.tgs"), Path::new("out"), "set", 1, TargetFormat::Png)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CliConverter {
    binary_path: PathBuf,
    still_frame_args: Vec<String>,
}

impl CliConverter {
    /// Create a converter with an explicit binary path and the default still-frame arguments
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            still_frame_args: ConverterConfig::default().still_frame_args,
        }
    }

    /// Replace the arguments passed for still formats
    pub fn with_still_frame_args(mut self, args: Vec<String>) -> Self {
        self.still_frame_args = args;
        self
    }

    /// Attempt to find `tool_name` in PATH
    pub fn from_path(tool_name: &str) -> Option<Self> {
        which::which(tool_name).ok().map(Self::new)
    }

    /// Build a converter from configuration
    ///
    /// An explicit `tool_path` wins; otherwise `tool_name` is searched in PATH when
    /// `search_path` is enabled.
    pub fn from_config(config: &ConverterConfig) -> crate::Result<Self> {
        let binary_path = match &config.tool_path {
            Some(path) => path.clone(),
            None if config.search_path => which::which(&config.tool_name).map_err(|_| {
                Error::Convert(ConvertError::ToolNotFound {
                    tool: config.tool_name.clone(),
                })
            })?,
            None => {
                return Err(Error::Convert(ConvertError::ToolNotFound {
                    tool: config.tool_name.clone(),
                }));
            }
        };

        Ok(Self::new(binary_path).with_still_frame_args(config.still_frame_args.clone()))
    }

    /// Path of the external tool
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn render(&self, source: &Path, output: &Path, format: TargetFormat) -> crate::Result<()> {
        let failed = |reason: String| {
            Error::Convert(ConvertError::Failed {
                source_path: source.to_path_buf(),
                format,
                reason,
            })
        };

        let mut command = Command::new(&self.binary_path);
        if format.is_still() {
            command.args(&self.still_frame_args);
        }
        command.arg(source).arg(output);

        debug!(binary = ?self.binary_path, ?source, ?output, %format, "running converter");

        let result = command
            .output()
            .await
            .map_err(|e| failed(format!("failed to execute {}: {}", self.binary_path.display(), e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(failed(format!("{}: {}", result.status, stderr.trim())));
        }

        if tokio::fs::metadata(output).await.is_err() {
            return Err(failed("tool exited successfully but wrote no output".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl Converter for CliConverter {
    async fn convert(
        &self,
        source: &Path,
        target_dir: &Path,
        base_name: &str,
        index: usize,
        format: TargetFormat,
    ) -> crate::Result<PathBuf> {
        if format == TargetFormat::Lottie {
            let source = source.to_path_buf();
            let target_dir = target_dir.to_path_buf();
            let base_name = base_name.to_string();
            return tokio::task::spawn_blocking(move || {
                extract_lottie(&source, &target_dir, &base_name, index)
            })
            .await
            .map_err(|e| Error::Other(format!("lottie extraction task failed: {}", e)))?;
        }

        let output = output_path(target_dir, base_name, index, format);
        self.render(source, &output, format).await?;
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_tool_path_wins() {
        let config = ConverterConfig {
            tool_path: Some(PathBuf::from("/opt/render/lottie_convert.py")),
            ..Default::default()
        };
        let converter = CliConverter::from_config(&config).unwrap();
        assert_eq!(
            converter.binary_path(),
            Path::new("/opt/render/lottie_convert.py")
        );
    }

    #[test]
    fn missing_tool_without_search_is_reported() {
        let config = ConverterConfig {
            tool_path: None,
            search_path: false,
            ..Default::default()
        };
        let err = CliConverter::from_config(&config).err().unwrap();
        assert!(matches!(
            err,
            Error::Convert(ConvertError::ToolNotFound { ref tool }) if tool == "lottie_convert.py"
        ));
    }

    #[test]
    fn unknown_tool_is_not_found_in_path() {
        let config = ConverterConfig {
            tool_name: "definitely-not-a-real-lottie-renderer".to_string(),
            ..Default::default()
        };
        assert!(CliConverter::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn missing_binary_fails_conversion() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("set_1.tgs");
        std::fs::write(&source, b"payload").unwrap();

        let converter = CliConverter::new(temp.path().join("no-such-binary"));
        let err = converter
            .convert(&source, temp.path(), "set", 1, TargetFormat::Gif)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Convert(ConvertError::Failed {
                format: TargetFormat::Gif,
                ..
            })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn still_formats_receive_frame_arguments() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let script = temp.path().join("fake-render.sh");
        // Records its arguments and copies the source to the output path
        std::fs::write(
            &script,
            r#"#!/bin/sh
echo "$@" > "$(dirname "$0")/args.txt"
eval "src=\${$(($# - 1))}"
eval "dst=\${$#}"
cp "$src" "$dst"
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = temp.path().join("set_1.tgs");
        std::fs::write(&source, b"payload").unwrap();
        let out_dir = temp.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let converter = CliConverter::new(script);
        let png = converter
            .convert(&source, &out_dir, "set", 1, TargetFormat::Png)
            .await
            .unwrap();

        assert_eq!(png, out_dir.join("set_1.png"));
        assert_eq!(std::fs::read(&png).unwrap(), b"payload");
        let args = std::fs::read_to_string(temp.path().join("args.txt")).unwrap();
        assert!(args.starts_with("--frame 0 "), "args were {args}");
    }
}
