use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Coarse classification of an indexed file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MediaKind {
    Video,
    Audio,
    Photo,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Photo => "photo",
            MediaKind::Other => "other",
        }
    }

    /// Photos and videos are the only kinds that get a generated thumbnail.
    pub fn is_thumbnailable(&self) -> bool {
        matches!(self, MediaKind::Photo | MediaKind::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            "photo" => Ok(MediaKind::Photo),
            "other" => Ok(MediaKind::Other),
            other => Err(ModelError::UnknownVariant {
                field: "media kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Kind of deferred work attached to a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum JobKind {
    Thumb,
    /// Enqueued by rescans; no worker consumes it yet.
    Metadata,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Thumb => "thumb",
            JobKind::Metadata => "metadata",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumb" => Ok(JobKind::Thumb),
            "metadata" => Ok(JobKind::Metadata),
            other => Err(ModelError::UnknownVariant {
                field: "job kind",
                value: other.to_string(),
            }),
        }
    }
}
