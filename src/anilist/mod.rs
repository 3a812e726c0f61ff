use async_trait::async_trait;

use crate::error::SyncError;

mod client;
mod map;
mod text;

pub use client::{AniListClient, CoverImage, FuzzyDate, Media, MediaTitle, Trailer};
pub use map::{canonical_id, to_anime_row, ID_PREFIX};
pub use text::{clean_description, strip_tags, MAX_DESCRIPTION_CHARS};

pub const ANILIST_ENDPOINT: &str = "https://graphql.anilist.co";
/// AniList caps `perPage` at 50.
pub const MAX_PER_PAGE: u32 = 50;

/// One page of the popularity-sorted anime catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub media: Vec<Media>,
    pub current_page: u32,
    pub total: Option<u64>,
    pub has_next_page: bool,
}

/// Paginated catalog the sync job mirrors into the store.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<CatalogPage, SyncError>;
}

#[async_trait]
impl CatalogSource for AniListClient {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<CatalogPage, SyncError> {
        self.fetch_popular_page(page, per_page).await
    }
}
