//! Read-side queries for browsing present items: filtered pages, folder
//! listings and filename search.

use lumen_model::{LibraryId, MediaItem, MediaKind};
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 200;

/// Folder listings stop after this many direct children.
pub const FOLDER_ITEM_LIMIT: u64 = 500;
pub const FOLDER_LIMIT: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemSort {
    /// Most recently observed by a scan first.
    #[default]
    LastSeen,
    /// `rel_path` ascending.
    Name,
    /// Most recently catalogued first.
    Newest,
}

/// Filter over present items. Absent items never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    /// `None` searches every library.
    pub library_id: Option<LibraryId>,
    pub kind: Option<MediaKind>,
    pub name: Option<NamePattern>,
    pub sort: ItemSort,
    pub offset: u64,
    pub limit: u64,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            library_id: None,
            kind: None,
            name: None,
            sort: ItemSort::default(),
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ItemQuery {
    /// Convert a 1-based page number and size into `offset`/`limit`. Page
    /// sizes of zero or above [`MAX_PAGE_SIZE`] fall back to the default.
    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        let size = if page_size == 0 || page_size > MAX_PAGE_SIZE {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        self.limit = size;
        self.offset = page.max(1).saturating_sub(1).saturating_mul(size);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ItemPage {
    /// Matches before `offset`/`limit` were applied.
    pub total: u64,
    pub items: Vec<MediaItem>,
}

/// Direct children of one folder of a library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FolderListing {
    /// Names of subfolders, sorted.
    pub folders: Vec<String>,
    /// Items directly inside the folder, sorted by `rel_path`.
    pub items: Vec<MediaItem>,
}

/// Case-insensitive match against `rel_path`.
///
/// `*` matches any run of characters and anchors the pattern to the whole
/// path; a pattern without `*` matches anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    raw: String,
}

impl NamePattern {
    /// `None` for blank input.
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        (!raw.is_empty()).then(|| Self {
            raw: raw.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn is_anchored(&self) -> bool {
        self.raw.contains('*')
    }

    /// Equivalent `ILIKE` pattern, escaping `%`, `_` and `\`.
    pub fn to_like(&self) -> String {
        let escaped = self
            .raw
            .split('*')
            .map(escape_like)
            .collect::<Vec<_>>()
            .join("%");
        if self.is_anchored() {
            escaped
        } else {
            format!("%{escaped}%")
        }
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        let text = rel_path.to_lowercase();
        if !self.is_anchored() {
            return text.contains(&self.raw);
        }

        let mut parts = self.raw.split('*');
        let first = parts.next().unwrap_or_default();
        let Some(mut rest) = text.strip_prefix(first) else {
            return false;
        };
        let mut parts: Vec<&str> = parts.collect();
        let last = parts.pop().unwrap_or_default();
        for part in parts {
            match rest.find(part) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }
        rest.ends_with(last)
    }
}

pub(crate) fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Normalise a folder path from a request into a `rel_path` prefix: no
/// leading or trailing slash, and `""` for the library root.
pub fn folder_prefix(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Where a `rel_path` sits relative to a folder prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FolderEntry<'a> {
    File,
    Subfolder(&'a str),
}

pub(crate) fn classify_in_folder<'a>(rel_path: &'a str, prefix: &str) -> Option<FolderEntry<'a>> {
    let rest = rel_path.strip_prefix(prefix)?;
    match rest.split_once('/') {
        Some((folder, _)) if !folder.is_empty() => Some(FolderEntry::Subfolder(folder)),
        Some(_) => None,
        None => Some(FolderEntry::File),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_patterns_match_anywhere() {
        let pattern = NamePattern::parse("  Beach ").unwrap();
        assert!(pattern.matches("2024/beach-day.jpg"));
        assert!(pattern.matches("BEACH.mp4"));
        assert!(!pattern.matches("mountain.jpg"));
        assert_eq!(pattern.to_like(), "%beach%");
        assert!(NamePattern::parse("   ").is_none());
    }

    #[test]
    fn wildcards_anchor_the_pattern() {
        let pattern = NamePattern::parse("*.MP4").unwrap();
        assert!(pattern.matches("clips/a.mp4"));
        assert!(!pattern.matches("clips/a.mp4.part"));
        assert_eq!(pattern.to_like(), "%.mp4");

        let pattern = NamePattern::parse("2024/*/img_*").unwrap();
        assert!(pattern.matches("2024/june/IMG_001.jpg"));
        assert!(!pattern.matches("2023/june/img_001.jpg"));

        let pattern = NamePattern::parse("a*a").unwrap();
        assert!(pattern.matches("aa"));
        assert!(!pattern.matches("a"));
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        let pattern = NamePattern::parse("100%_done").unwrap();
        assert_eq!(pattern.to_like(), "%100\\%\\_done%");
        assert!(pattern.matches("x/100%_done.jpg"));
        assert!(!pattern.matches("x/1000_done.jpg"));
    }

    #[test]
    fn pages_translate_to_offsets() {
        let query = ItemQuery::default().with_page(3, 20);
        assert_eq!((query.offset, query.limit), (40, 20));

        let query = ItemQuery::default().with_page(0, 500);
        assert_eq!((query.offset, query.limit), (0, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn folder_children() {
        assert_eq!(folder_prefix("/2024/june/"), "2024/june/");
        assert_eq!(folder_prefix(" / "), "");

        assert_eq!(classify_in_folder("a.jpg", ""), Some(FolderEntry::File));
        assert_eq!(
            classify_in_folder("2024/june/a.jpg", ""),
            Some(FolderEntry::Subfolder("2024"))
        );
        assert_eq!(
            classify_in_folder("2024/june/a.jpg", "2024/"),
            Some(FolderEntry::Subfolder("june"))
        );
        assert_eq!(
            classify_in_folder("2024/a.jpg", "2024/"),
            Some(FolderEntry::File)
        );
        assert_eq!(classify_in_folder("2023/a.jpg", "2024/"), None);
    }
}
