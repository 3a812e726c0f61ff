use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status as stored in `anime_index.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimeStatus {
    Airing,
    Completed,
    Upcoming,
}

impl AnimeStatus {
    /// Maps an AniList `MediaStatus` code. Cancelled titles count as completed,
    /// hiatus as airing, and anything unknown as completed.
    pub fn from_anilist(code: Option<&str>) -> Self {
        match code {
            Some("RELEASING") => AnimeStatus::Airing,
            Some("FINISHED") => AnimeStatus::Completed,
            Some("NOT_YET_RELEASED") => AnimeStatus::Upcoming,
            Some("CANCELLED") => AnimeStatus::Completed,
            Some("HIATUS") => AnimeStatus::Airing,
            _ => AnimeStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimeStatus::Airing => "airing",
            AnimeStatus::Completed => "completed",
            AnimeStatus::Upcoming => "upcoming",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn from_anilist(code: Option<&str>) -> Option<Self> {
        match code? {
            "WINTER" => Some(Season::Winter),
            "SPRING" => Some(Season::Spring),
            "SUMMER" => Some(Season::Summer),
            "FALL" => Some(Season::Fall),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

/// One row of `anime_index`: the normalized form of a catalog title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeRow {
    pub id: String,
    pub title: String,
    pub rating: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub season: Option<Season>,
    pub status: AnimeStatus,
    pub episodes: Option<i32>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub banner_image: Option<String>,
    pub trailer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anilist_id: Option<i32>,
}

/// Narrow projection used by search suggestions and list/profile embeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeSummary {
    pub id: String,
    pub title: String,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub avatar_url: Option<String>,
}

impl UserSummary {
    pub fn anonymous() -> Self {
        Self {
            username: "Anonymous".to_string(),
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub id: String,
    pub anime_id: String,
    pub user_id: String,
    pub rating: f64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRating {
    pub id: String,
    pub user_id: String,
    pub anime_id: String,
    pub episode_number: i32,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeComment {
    pub id: String,
    pub user_id: String,
    pub anime_id: String,
    pub episode_number: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserList {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewList {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListItem {
    pub id: String,
    pub anime_id: String,
    pub anime: Option<AnimeSummary>,
}

/// Row of `users` as shown on the profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Profile edit. Blank `bio`/`avatar_url` clear the column; `username: None` leaves it as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRating {
    pub id: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub anime: Option<AnimeSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserComment {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub anime: Option<AnimeSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserEpisodeRating {
    pub id: String,
    pub rating: f64,
    pub episode_number: i32,
    pub created_at: DateTime<Utc>,
    pub anime: Option<AnimeSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserEpisodeComment {
    pub id: String,
    pub content: String,
    pub episode_number: i32,
    pub created_at: DateTime<Utc>,
    pub anime: Option<AnimeSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModerationFilter {
    All,
    #[default]
    Reported,
}

/// A title comment as seen from the moderation queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeratedComment {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub reported: bool,
    pub user: UserSummary,
}

/// Browse filters. `status == Some("all")` behaves like no status filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimeFilters {
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub season: Option<Season>,
    pub status: Option<String>,
    pub query: Option<String>,
}

/// One page of browse results plus the exact match count.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimePage {
    pub data: Vec<AnimeRow>,
    pub has_more: bool,
    pub total_count: u64,
    pub total_pages: u64,
}

impl AnimePage {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            has_more: false,
            total_count: 0,
            total_pages: 0,
        }
    }
}
