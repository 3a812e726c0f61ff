use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{CatalogPage, ANILIST_ENDPOINT};
use crate::error::SyncError;

// Keep this query stable and explicit; it is logged at debug level on every page.
const POPULAR_PAGE_QUERY: &str = r#"
query ($page: Int, $perPage: Int) {
  Page(page: $page, perPage: $perPage) {
    pageInfo {
      total
      currentPage
      hasNextPage
    }
    media(type: ANIME, sort: POPULARITY_DESC) {
      id
      title { romaji english }
      averageScore
      genres
      startDate { year }
      season
      status
      episodes
      description
      coverImage { large }
      bannerImage
      trailer { id site }
    }
  }
}
"#;

#[derive(Debug, Clone)]
pub struct AniListClient {
    client: Client,
    endpoint: String,
}

impl AniListClient {
    pub fn new() -> Result<Self, SyncError> {
        Self::with_endpoint(ANILIST_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, SyncError> {
        let user_agent = format!("anidex/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                SyncError::configuration(format!("Failed to build AniList HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) async fn fetch_popular_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<CatalogPage, SyncError> {
        let body = json!({
            "query": POPULAR_PAGE_QUERY,
            "variables": { "page": page, "perPage": per_page }
        });
        debug!("AniList request page={} perPage={}", page, per_page);

        let unavailable = |reason: String| SyncError::SourceUnavailable { page, reason };
        let protocol = |reason: String| SyncError::SourceProtocol { page, reason };

        let res = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable(format!("AniList request failed: {}", e)))?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| unavailable(format!("Failed to read AniList body: {}", e)))?;
        if !status.is_success() {
            return Err(unavailable(format!(
                "AniList HTTP error (status {}): {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        parse_page_response(page, &bytes).map_err(protocol)
    }
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
    status: Option<i32>,
}

#[derive(Deserialize)]
struct Data {
    #[serde(rename = "Page")]
    page: Option<PageData>,
}

#[derive(Deserialize)]
struct PageData {
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
    media: Option<Vec<Media>>,
}

#[derive(Deserialize)]
struct PageInfo {
    total: Option<u64>,
    #[serde(rename = "currentPage")]
    current_page: Option<u32>,
    #[serde(rename = "hasNextPage")]
    has_next_page: Option<bool>,
}

fn parse_page_response(page: u32, bytes: &[u8]) -> Result<CatalogPage, String> {
    let parsed: GraphQlResponse<Data> = serde_json::from_slice(bytes)
        .map_err(|e| format!("Failed to parse AniList JSON: {}", e))?;
    if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
        let msg = errors
            .into_iter()
            .map(|e| match e.status {
                Some(s) => format!("{} (status {})", e.message, s),
                None => e.message,
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(format!("AniList GraphQL error: {}", msg));
    }

    let page_data = parsed
        .data
        .and_then(|d| d.page)
        .ok_or_else(|| format!("AniList returned no Page for page {}", page))?;
    let info = page_data.page_info;

    Ok(CatalogPage {
        media: page_data.media.unwrap_or_default(),
        current_page: info.as_ref().and_then(|i| i.current_page).unwrap_or(page),
        total: info.as_ref().and_then(|i| i.total),
        has_next_page: info.and_then(|i| i.has_next_page).unwrap_or(false),
    })
}

/// A catalog title as AniList returns it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Media {
    pub id: i32,
    pub title: Option<MediaTitle>,
    #[serde(rename = "averageScore")]
    pub average_score: Option<i32>,
    pub genres: Option<Vec<String>>,
    #[serde(rename = "startDate")]
    pub start_date: Option<FuzzyDate>,
    pub season: Option<String>,
    pub status: Option<String>,
    pub episodes: Option<i32>,
    pub description: Option<String>,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<CoverImage>,
    #[serde(rename = "bannerImage")]
    pub banner_image: Option<String>,
    pub trailer: Option<Trailer>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CoverImage {
    pub large: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Trailer {
    pub id: Option<String>,
    pub site: Option<String>,
}
