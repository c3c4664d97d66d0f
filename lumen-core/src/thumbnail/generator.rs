use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use lumen_model::MediaKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Longest edge of generated thumbnails, in pixels.
pub const THUMB_EDGE: u32 = 320;

/// Duration assumed when ffprobe cannot report one.
pub const FALLBACK_VIDEO_DURATION_SECS: f64 = 30.0;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("source file does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("unsupported kind: {0}")]
    UnsupportedKind(MediaKind),

    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed: {status}, output: {output}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        output: String,
    },

    #[error("thumbnail io error: {0}")]
    Io(#[from] io::Error),
}

/// Produces a thumbnail image for one source file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync + fmt::Debug {
    async fn generate(
        &self,
        source: &Path,
        dest: &Path,
        kind: MediaKind,
    ) -> Result<(), ThumbnailError>;
}

/// Locations of the external media tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub convert: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            convert: PathBuf::from("convert"),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Seek position for the representative video frame: 10% in, clamped to
/// [5s, 120s], or 25% in when the clamp overshoots a short clip.
pub fn seek_offset_seconds(duration: f64) -> f64 {
    let seek = (duration * 0.10).clamp(5.0, 120.0);
    if seek > duration {
        duration * 0.25
    } else {
        seek
    }
}

/// Parse ffprobe's bare `format=duration` output.
pub fn parse_probe_duration(stdout: &[u8]) -> Option<f64> {
    std::str::from_utf8(stdout)
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Shells out to ImageMagick for photos and ffprobe/ffmpeg for videos.
#[derive(Debug, Clone, Default)]
pub struct CommandThumbnailer {
    tools: ToolPaths,
}

impl CommandThumbnailer {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    async fn photo(&self, source: &Path, dest: &Path) -> Result<(), ThumbnailError> {
        let mut cmd = Command::new(&self.tools.convert);
        cmd.arg(source)
            .arg("-thumbnail")
            .arg(format!("{THUMB_EDGE}x{THUMB_EDGE}>"))
            .arg("-quality")
            .arg("85")
            .arg("-strip")
            .arg(dest);
        run_tool("convert", &mut cmd).await
    }

    async fn video(&self, source: &Path, dest: &Path) -> Result<(), ThumbnailError> {
        let duration = self.probe_duration(source).await;
        let seek = seek_offset_seconds(duration);
        debug!(
            source = %source.display(),
            duration,
            seek,
            "extracting video frame"
        );

        let mut cmd = Command::new(&self.tools.ffmpeg);
        cmd.arg("-y")
            .arg("-ss")
            .arg(format!("{seek:.2}"))
            .arg("-i")
            .arg(source)
            .arg("-vframes")
            .arg("1")
            .arg("-vf")
            .arg(format!("scale={THUMB_EDGE}:-1"))
            .arg("-q:v")
            .arg("5")
            .arg(dest);
        run_tool("ffmpeg", &mut cmd).await
    }

    async fn probe_duration(&self, source: &Path) -> f64 {
        let output = Command::new(&self.tools.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(source)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                parse_probe_duration(&output.stdout)
                    .unwrap_or(FALLBACK_VIDEO_DURATION_SECS)
            }
            _ => FALLBACK_VIDEO_DURATION_SECS,
        }
    }
}

async fn run_tool(tool: &str, cmd: &mut Command) -> Result<(), ThumbnailError> {
    let output = cmd
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ThumbnailError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(ThumbnailError::ToolFailed {
        tool: tool.to_string(),
        status: output.status,
        output: combined.trim().to_string(),
    })
}

#[async_trait]
impl ThumbnailGenerator for CommandThumbnailer {
    async fn generate(
        &self,
        source: &Path,
        dest: &Path,
        kind: MediaKind,
    ) -> Result<(), ThumbnailError> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(ThumbnailError::SourceMissing(source.to_path_buf()));
        }

        match kind {
            MediaKind::Photo => self.photo(source, dest).await,
            MediaKind::Video => self.video(source, dest).await,
            other => Err(ThumbnailError::UnsupportedKind(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_is_ten_percent_within_bounds() {
        assert_eq!(seek_offset_seconds(600.0), 60.0);
        assert_eq!(seek_offset_seconds(30.0), 5.0);
        assert_eq!(seek_offset_seconds(3600.0), 120.0);
    }

    #[test]
    fn short_clips_fall_back_to_a_quarter() {
        assert_eq!(seek_offset_seconds(4.0), 1.0);
        assert_eq!(seek_offset_seconds(0.0), 0.0);
    }

    #[test]
    fn probe_output_parsing() {
        assert_eq!(parse_probe_duration(b"12.500000\n"), Some(12.5));
        assert_eq!(parse_probe_duration(b"N/A\n"), None);
        assert_eq!(parse_probe_duration(b""), None);
    }

    #[tokio::test]
    async fn missing_source_fails_before_any_tool_runs() {
        let thumbnailer = CommandThumbnailer::new(ToolPaths {
            convert: PathBuf::from("/definitely/not/convert"),
            ..ToolPaths::default()
        });
        let err = thumbnailer
            .generate(
                Path::new("/definitely/not/here.jpg"),
                Path::new("/tmp/out.jpg"),
                MediaKind::Photo,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::SourceMissing(_)));
    }

    #[tokio::test]
    async fn audio_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("song.mp3");
        std::fs::write(&source, b"id3").unwrap();

        let err = CommandThumbnailer::default()
            .generate(&source, &dir.path().join("out.jpg"), MediaKind::Audio)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported kind: audio");
    }

    #[tokio::test]
    async fn missing_tool_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        std::fs::write(&source, b"jpeg").unwrap();

        let thumbnailer = CommandThumbnailer::new(ToolPaths {
            convert: dir.path().join("no-such-convert"),
            ..ToolPaths::default()
        });
        let err = thumbnailer
            .generate(&source, &dir.path().join("out.jpg"), MediaKind::Photo)
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Spawn { .. }));
    }
}
