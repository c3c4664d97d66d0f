use std::collections::HashSet;
use std::path::Path;

use lumen_model::MediaKind;

pub const DEFAULT_PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "tif", "tiff", "bmp",
    "avif",
];
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "m4a", "aac", "ogg", "opus", "wav", "wma", "alac",
];
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "mov", "avi", "webm", "m4v", "wmv", "mpg", "mpeg", "ts",
];

/// Immutable extension tables built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindClassifier {
    photo: HashSet<String>,
    audio: HashSet<String>,
    video: HashSet<String>,
    index_other: bool,
}

impl Default for KindClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_PHOTO_EXTENSIONS.iter().copied(),
            DEFAULT_AUDIO_EXTENSIONS.iter().copied(),
            DEFAULT_VIDEO_EXTENSIONS.iter().copied(),
            false,
        )
    }
}

fn normalize<'a>(exts: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    exts.into_iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

impl KindClassifier {
    pub fn new<'a>(
        photo: impl IntoIterator<Item = &'a str>,
        audio: impl IntoIterator<Item = &'a str>,
        video: impl IntoIterator<Item = &'a str>,
        index_other: bool,
    ) -> Self {
        Self {
            photo: normalize(photo),
            audio: normalize(audio),
            video: normalize(video),
            index_other,
        }
    }

    pub fn with_index_other(mut self, index_other: bool) -> Self {
        self.index_other = index_other;
        self
    }

    pub fn index_other(&self) -> bool {
        self.index_other
    }

    /// Kind for a path, or `None` when the file should not be indexed.
    ///
    /// Photo wins over audio, audio over video, when an extension is listed
    /// in more than one table.
    pub fn classify(&self, path: &Path) -> Option<MediaKind> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if !ext.is_empty() {
            if self.photo.contains(&ext) {
                return Some(MediaKind::Photo);
            }
            if self.audio.contains(&ext) {
                return Some(MediaKind::Audio);
            }
            if self.video.contains(&ext) {
                return Some(MediaKind::Video);
            }
        }

        self.index_other.then_some(MediaKind::Other)
    }
}
