//! Opening catalogued files for playback, with range resolution.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::Utc;
use lumen_model::{MediaItem, MediaItemId};
use tokio::fs::File;
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::{MediaError, Result};

/// A present item together with its freshly opened file.
#[derive(Debug)]
pub struct OpenedMedia {
    pub item: MediaItem,
    pub file: File,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Resolves item ids to readable files and keeps presence honest when a
/// file has vanished between scans.
#[derive(Clone)]
pub struct StreamGateway {
    catalog: Arc<dyn CatalogStore>,
}

impl fmt::Debug for StreamGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamGateway")
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl StreamGateway {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Open the file behind an item.
    ///
    /// Unknown and absent items are `NotFound`. A present item whose file
    /// cannot be opened is flipped to absent before `NotFound` is returned.
    pub async fn open(&self, id: MediaItemId) -> Result<OpenedMedia> {
        let item = self
            .catalog
            .get_item(id)
            .await?
            .filter(MediaItem::is_available)
            .ok_or_else(|| MediaError::NotFound(format!("media item {id}")))?;

        let opened = async {
            let file = File::open(&item.path).await?;
            let metadata = file.metadata().await?;
            Ok::<_, std::io::Error>((file, metadata))
        }
        .await;

        match opened {
            Ok((file, metadata)) => Ok(OpenedMedia {
                len: metadata.len(),
                modified: metadata.modified().ok(),
                file,
                item,
            }),
            Err(err) => {
                info!(
                    target: "stream",
                    item_id = %id,
                    path = %item.path.display(),
                    error = %err,
                    "file vanished, marking item missing"
                );
                if let Err(mark_err) = self.catalog.mark_item_missing(id, Utc::now()).await {
                    warn!(
                        target: "stream",
                        item_id = %id,
                        error = %mark_err,
                        "failed to mark item missing"
                    );
                }
                Err(MediaError::NotFound(format!(
                    "media item {id}: {}",
                    item.path.display()
                )))
            }
        }
    }
}

/// Result of interpreting a `Range` header against a file length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable range: serve the whole file.
    Full,
    /// Serve the inclusive byte span.
    Partial(RangeInclusive<u64>),
    /// Malformed or outside the file.
    Unsatisfiable,
}

impl RangeRequest {
    /// Interpret a single-range `Range` header value.
    ///
    /// Units other than `bytes` are ignored. An end past the last byte is
    /// clamped; a start past it, an inverted span, a zero-length suffix or a
    /// multi-range list is unsatisfiable.
    pub fn parse(header: Option<&str>, len: u64) -> Self {
        let Some(header) = header.map(str::trim) else {
            return RangeRequest::Full;
        };
        let Some(ranges) = header.strip_prefix("bytes=") else {
            return RangeRequest::Full;
        };
        if len == 0 || ranges.contains(',') {
            return RangeRequest::Unsatisfiable;
        }
        let Some((start, end)) = ranges.trim().split_once('-') else {
            return RangeRequest::Unsatisfiable;
        };
        let last = len - 1;

        match (start.trim(), end.trim()) {
            ("", "") => RangeRequest::Unsatisfiable,
            ("", suffix) => match suffix.parse::<u64>() {
                Ok(0) | Err(_) => RangeRequest::Unsatisfiable,
                Ok(n) => RangeRequest::Partial(len.saturating_sub(n)..=last),
            },
            (start, "") => match start.parse::<u64>() {
                Ok(start) if start <= last => RangeRequest::Partial(start..=last),
                _ => RangeRequest::Unsatisfiable,
            },
            (start, end) => match (start.parse::<u64>(), end.parse::<u64>()) {
                (Ok(start), Ok(end)) if start <= end && start <= last => {
                    RangeRequest::Partial(start..=end.min(last))
                }
                _ => RangeRequest::Unsatisfiable,
            },
        }
    }
}
