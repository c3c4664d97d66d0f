//! Browsing and search over present items.

use axum::{
    Json,
    extract::{Query, State},
};
use lumen_core::{FolderListing, ItemQuery, ItemSort, NamePattern, folder_prefix};
use lumen_model::{LibraryId, MediaItem, MediaKind};
use serde::{Deserialize, Serialize};

use super::libraries::ensure_library;
use crate::infra::{app_state::AppState, errors::AppResult};

const SEARCH_LIMIT: u64 = 100;
const DEFAULT_RECENT_LIMIT: u64 = 20;
const MAX_RECENT_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortParam {
    #[default]
    Recent,
    Name,
}

impl From<SortParam> for ItemSort {
    fn from(sort: SortParam) -> Self {
        match sort {
            SortParam::Recent => ItemSort::LastSeen,
            SortParam::Name => ItemSort::Name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    pub library_id: LibraryId,
    pub kind: Option<MediaKind>,
    pub q: Option<String>,
    #[serde(default)]
    pub sort: SortParam,
    #[serde(default)]
    pub page: u64,
    #[serde(default, alias = "pageSize")]
    pub page_size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PagedItems {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub items: Vec<MediaItem>,
}

/// GET /api/items?library_id=&kind=&q=&sort=recent|name&page=&page_size=
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ItemsQuery>,
) -> AppResult<Json<PagedItems>> {
    ensure_library(&state, params.library_id).await?;

    let query = ItemQuery {
        library_id: Some(params.library_id),
        kind: params.kind,
        name: params.q.as_deref().and_then(NamePattern::parse),
        sort: params.sort.into(),
        ..ItemQuery::default()
    }
    .with_page(params.page, params.page_size);

    let page = state.catalog().query_items(&query).await?;
    Ok(Json(PagedItems {
        page: query.offset / query.limit + 1,
        page_size: query.limit,
        total: page.total,
        items: page.items,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FoldersQuery {
    pub library_id: LibraryId,
    #[serde(default)]
    pub path: String,
}

/// GET /api/folders?library_id=&path=
pub async fn list_folder(
    State(state): State<AppState>,
    Query(params): Query<FoldersQuery>,
) -> AppResult<Json<FolderListing>> {
    ensure_library(&state, params.library_id).await?;
    let listing = state
        .catalog()
        .list_folder(params.library_id, &folder_prefix(&params.path))
        .await?;
    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub library_id: Option<LibraryId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResults {
    pub by_filename: Vec<MediaItem>,
}

/// GET /api/search?q=&library_id=
///
/// Filename search; `*` is a wildcard. A blank query returns no results.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    let Some(pattern) = NamePattern::parse(&params.q) else {
        return Ok(Json(SearchResults {
            by_filename: Vec::new(),
        }));
    };

    let page = state
        .catalog()
        .query_items(&ItemQuery {
            library_id: params.library_id,
            name: Some(pattern),
            sort: ItemSort::Name,
            limit: SEARCH_LIMIT,
            ..ItemQuery::default()
        })
        .await?;
    Ok(Json(SearchResults {
        by_filename: page.items,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub library_id: Option<LibraryId>,
    pub limit: Option<u64>,
}

/// GET /api/recent?library_id=&limit=
///
/// Newest catalogued present items first.
pub async fn recent_items(
    State(state): State<AppState>,
    Query(params): Query<RecentQuery>,
) -> AppResult<Json<Vec<MediaItem>>> {
    let limit = params
        .limit
        .filter(|limit| (1..=MAX_RECENT_LIMIT).contains(limit))
        .unwrap_or(DEFAULT_RECENT_LIMIT);

    let page = state
        .catalog()
        .query_items(&ItemQuery {
            library_id: params.library_id,
            sort: ItemSort::Newest,
            limit,
            ..ItemQuery::default()
        })
        .await?;
    Ok(Json(page.items))
}
