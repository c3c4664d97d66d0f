use std::time::Duration;

use super::classify::{
    DEFAULT_AUDIO_EXTENSIONS, DEFAULT_PHOTO_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS,
    KindClassifier,
};
use super::scanner::RescanJobPolicy;

pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Scanner-facing configuration, resolved from file and environment by the
/// server before anything is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerSettings {
    pub photo_extensions: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub index_other: bool,
    pub rescan_job_policy: RescanJobPolicy,
    /// Upper bound on a background scan started over HTTP.
    pub timeout: Duration,
}

fn owned(exts: &[&str]) -> Vec<String> {
    exts.iter().map(|ext| (*ext).to_string()).collect()
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            photo_extensions: owned(DEFAULT_PHOTO_EXTENSIONS),
            audio_extensions: owned(DEFAULT_AUDIO_EXTENSIONS),
            video_extensions: owned(DEFAULT_VIDEO_EXTENSIONS),
            index_other: false,
            rescan_job_policy: RescanJobPolicy::default(),
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

impl ScannerSettings {
    pub fn classifier(&self) -> KindClassifier {
        KindClassifier::new(
            self.photo_extensions.iter().map(String::as_str),
            self.audio_extensions.iter().map(String::as_str),
            self.video_extensions.iter().map(String::as_str),
            self.index_other,
        )
    }
}
