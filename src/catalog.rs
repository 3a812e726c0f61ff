//! Typed data access for the application: browsing, reviews, ratings, comments and lists.
//!
//! Every function takes the store handle explicitly and decodes the response
//! once, here, into the model types.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

use crate::error::StoreError;
use crate::models::{
    AnimeFilters, AnimePage, AnimeRow, AnimeSummary, EpisodeComment, EpisodeRating, ListItem,
    ModeratedComment, ModerationFilter, NewList, ProfileUpdate, Review, Season, UserComment,
    UserEpisodeComment, UserEpisodeRating, UserList, UserProfile, UserRating, UserSummary,
};
use crate::sanitize::{
    sanitize_comment, sanitize_input, sanitize_search_query, sanitize_text, sanitize_username,
};
use crate::store::{Filter, Select, StoreClient, ANIME_TABLE};

pub const DEFAULT_PAGE_SIZE: u64 = 24;
pub const TRENDING_LIMIT: u64 = 6;
pub const SHELF_LIMIT: u64 = 12;
pub const SUGGESTION_LIMIT: u64 = 10;
/// Cap on each of a user's activity lists.
pub const ACTIVITY_LIMIT: u64 = 100;

pub const GENRES: [&str; 13] = [
    "Action",
    "Adventure",
    "Comedy",
    "Drama",
    "Fantasy",
    "Horror",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Slice of Life",
    "Sports",
    "Supernatural",
    "Thriller",
];

pub const SEASONS: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

pub const STATUS_FILTERS: [&str; 4] = ["all", "airing", "completed", "upcoming"];

const LIST_COLUMNS: &str = "id,name,description,is_private,created_at";

/// Years offered by the browse filter: the current year and the 24 before it.
pub fn filter_years() -> Vec<i32> {
    let current = Utc::now().year();
    (0..25).map(|i| current - i).collect()
}

fn apply_filters(mut select: Select, filters: &AnimeFilters) -> Select {
    if let Some(status) = filters.status.as_deref().filter(|s| *s != "all") {
        select = select.eq("status", status);
    }
    if let Some(year) = filters.year {
        select = select.eq("year", year);
    }
    if let Some(season) = filters.season {
        select = select.eq("season", season.as_str());
    }
    if !filters.genres.is_empty() {
        select = select.overlaps("genres", filters.genres.as_slice());
    }
    select
}

pub async fn anime_list(
    store: &StoreClient,
    filters: &AnimeFilters,
) -> Result<Vec<AnimeRow>, StoreError> {
    let select = apply_filters(Select::from(ANIME_TABLE), filters).order("rating", false);
    store.fetch(&select).await
}

/// One browse page (1-based) with the exact number of matches.
pub async fn anime_list_paginated(
    store: &StoreClient,
    filters: &AnimeFilters,
    page: u64,
    page_size: u64,
) -> Result<AnimePage, StoreError> {
    if page == 0 || page_size == 0 {
        return Err(StoreError::InvalidInput(format!(
            "page and page size must be positive (page={}, page_size={})",
            page, page_size
        )));
    }

    let mut select = apply_filters(Select::from(ANIME_TABLE), filters);
    if let Some(q) = filters
        .query
        .as_deref()
        .map(sanitize_search_query)
        .filter(|q| !q.is_empty())
    {
        select = select.ilike("title", &format!("*{}*", q));
    }

    let (from, to) = (page - 1)
        .checked_mul(page_size)
        .and_then(|from| from.checked_add(page_size - 1).map(|to| (from, to)))
        .ok_or_else(|| {
            StoreError::InvalidInput(format!(
                "page {} of size {} is out of range",
                page, page_size
            ))
        })?;
    let select = select.count_exact().order("rating", false).range(from, to);

    let (data, count) = store.fetch_counted::<AnimeRow>(&select).await?;
    Ok(page_summary(data, count.unwrap_or(0), page_size, to))
}

fn page_summary(data: Vec<AnimeRow>, total_count: u64, page_size: u64, to: u64) -> AnimePage {
    AnimePage {
        data,
        has_more: total_count > to.saturating_add(1),
        total_count,
        total_pages: total_count.div_ceil(page_size),
    }
}

pub async fn anime_by_id(store: &StoreClient, id: &str) -> Result<Option<AnimeRow>, StoreError> {
    store
        .fetch_optional(&Select::from(ANIME_TABLE).eq("id", id))
        .await
}

pub async fn trending(store: &StoreClient, limit: u64) -> Result<Vec<AnimeRow>, StoreError> {
    top_rated(store, limit).await
}

pub async fn fan_favorites(store: &StoreClient, limit: u64) -> Result<Vec<AnimeRow>, StoreError> {
    top_rated(store, limit).await
}

async fn top_rated(store: &StoreClient, limit: u64) -> Result<Vec<AnimeRow>, StoreError> {
    let select = Select::from(ANIME_TABLE).order("rating", false).limit(limit);
    store.fetch(&select).await
}

pub async fn airing_now(store: &StoreClient, limit: u64) -> Result<Vec<AnimeRow>, StoreError> {
    let select = Select::from(ANIME_TABLE)
        .eq("status", "airing")
        .order("rating", false)
        .limit(limit);
    store.fetch(&select).await
}

pub async fn upcoming(store: &StoreClient, limit: u64) -> Result<Vec<AnimeRow>, StoreError> {
    let select = Select::from(ANIME_TABLE)
        .eq("status", "upcoming")
        .order("year", true)
        .limit(limit);
    store.fetch(&select).await
}

/// Title-prefix matches for the search box. A blank query never hits the store.
pub async fn search_suggestions(
    store: &StoreClient,
    query: &str,
    limit: u64,
) -> Result<Vec<AnimeSummary>, StoreError> {
    let query = sanitize_search_query(query);
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let select = Select::from(ANIME_TABLE)
        .columns("id,title,cover_image,genres")
        .ilike("title", &format!("{}*", query))
        .limit(limit)
        .order("rating", false);
    store.fetch(&select).await
}

#[derive(Deserialize)]
struct UserEmbed {
    username: Option<String>,
    avatar_url: Option<String>,
}

fn user_or_anonymous(user: Option<UserEmbed>) -> UserSummary {
    match user {
        Some(u) => UserSummary {
            username: u
                .username
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UserSummary::anonymous().username),
            avatar_url: u.avatar_url.filter(|a| !a.is_empty()),
        },
        None => UserSummary::anonymous(),
    }
}

#[derive(Deserialize)]
struct CommentRow {
    id: String,
    anime_id: String,
    user_id: String,
    content: String,
    created_at: DateTime<Utc>,
    user: Option<UserEmbed>,
}

#[derive(Deserialize)]
struct UserRatingRow {
    user_id: String,
    rating: f64,
}

/// Comments on a title, newest first, each with the author's rating of it (0 if unrated).
pub async fn anime_reviews(store: &StoreClient, anime_id: &str) -> Result<Vec<Review>, StoreError> {
    let comments = Select::from("comments")
        .columns(
            r#"
            id,
            anime_id,
            user_id,
            content,
            created_at,
            user:users!comments_user_id_fkey (
              username,
              avatar_url
            )
            "#,
        )
        .eq("anime_id", anime_id)
        .order("created_at", false);
    let comments: Vec<CommentRow> = store.fetch(&comments).await?;

    let ratings = Select::from("ratings")
        .columns("user_id,rating")
        .eq("anime_id", anime_id);
    // Reviews still render without ratings.
    let ratings: HashMap<String, f64> = match store.fetch::<UserRatingRow>(&ratings).await {
        Ok(rows) => rows.into_iter().map(|r| (r.user_id, r.rating)).collect(),
        Err(e) => {
            warn!("Failed to load ratings for {}: {}", anime_id, e);
            HashMap::new()
        }
    };

    Ok(comments
        .into_iter()
        .map(|c| Review {
            rating: ratings.get(&c.user_id).copied().unwrap_or(0.0),
            id: c.id,
            anime_id: c.anime_id,
            user_id: c.user_id,
            content: c.content,
            created_at: c.created_at,
            user: user_or_anonymous(c.user),
        })
        .collect())
}

pub async fn episode_ratings(
    store: &StoreClient,
    anime_id: &str,
    episode_number: i32,
) -> Result<Vec<EpisodeRating>, StoreError> {
    let select = Select::from("episode_ratings")
        .eq("anime_id", anime_id)
        .eq("episode_number", episode_number)
        .order("created_at", false);
    store.fetch(&select).await
}

#[derive(Deserialize)]
struct EpisodeCommentRow {
    id: String,
    user_id: String,
    anime_id: String,
    episode_number: i32,
    content: String,
    created_at: DateTime<Utc>,
    user: Option<UserEmbed>,
}

pub async fn episode_comments(
    store: &StoreClient,
    anime_id: &str,
    episode_number: i32,
) -> Result<Vec<EpisodeComment>, StoreError> {
    let select = Select::from("episode_comments")
        .columns(
            "id,user_id,anime_id,episode_number,content,created_at,\
             user:users!episode_comments_user_id_fkey(username,avatar_url)",
        )
        .eq("anime_id", anime_id)
        .eq("episode_number", episode_number)
        .order("created_at", false);
    let rows: Vec<EpisodeCommentRow> = store.fetch(&select).await?;
    Ok(rows
        .into_iter()
        .map(|c| EpisodeComment {
            id: c.id,
            user_id: c.user_id,
            anime_id: c.anime_id,
            episode_number: c.episode_number,
            content: c.content,
            created_at: c.created_at,
            user: user_or_anonymous(c.user),
        })
        .collect())
}

fn check_rating(rating: f64) -> Result<(), StoreError> {
    if rating.is_finite() && (0.0..=10.0).contains(&rating) {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "rating must be between 0 and 10, got {}",
            rating
        )))
    }
}

fn check_episode(episode_number: i32) -> Result<(), StoreError> {
    if episode_number < 1 {
        return Err(StoreError::InvalidInput(format!(
            "episode number must be positive, got {}",
            episode_number
        )));
    }
    Ok(())
}

fn comment_body(content: &str) -> Result<String, StoreError> {
    let content = sanitize_comment(content);
    if content.is_empty() {
        return Err(StoreError::InvalidInput("comment is empty".to_string()));
    }
    Ok(content)
}

/// Sets (or replaces) a user's rating of a title.
pub async fn rate_anime(
    store: &StoreClient,
    user_id: &str,
    anime_id: &str,
    rating: f64,
) -> Result<(), StoreError> {
    check_rating(rating)?;
    let row = json!({ "user_id": user_id, "anime_id": anime_id, "rating": rating });
    store.upsert("ratings", &row, "user_id,anime_id").await
}

pub async fn rate_episode(
    store: &StoreClient,
    user_id: &str,
    anime_id: &str,
    episode_number: i32,
    rating: f64,
) -> Result<(), StoreError> {
    check_rating(rating)?;
    check_episode(episode_number)?;
    let row = json!({
        "user_id": user_id,
        "anime_id": anime_id,
        "episode_number": episode_number,
        "rating": rating
    });
    store
        .upsert("episode_ratings", &row, "user_id,anime_id,episode_number")
        .await
}

pub async fn post_comment(
    store: &StoreClient,
    user_id: &str,
    anime_id: &str,
    content: &str,
) -> Result<(), StoreError> {
    let content = comment_body(content)?;
    let row = json!({ "user_id": user_id, "anime_id": anime_id, "content": content });
    store.insert("comments", &row).await
}

pub async fn post_episode_comment(
    store: &StoreClient,
    user_id: &str,
    anime_id: &str,
    episode_number: i32,
    content: &str,
) -> Result<(), StoreError> {
    check_episode(episode_number)?;
    let content = comment_body(content)?;
    let row = json!({
        "user_id": user_id,
        "anime_id": anime_id,
        "episode_number": episode_number,
        "content": content
    });
    store.insert("episode_comments", &row).await
}

// Row `id` in `table`, but only if `user_id` owns it.
async fn delete_owned(
    store: &StoreClient,
    table: &str,
    id: &str,
    user_id: &str,
) -> Result<bool, StoreError> {
    let removed = store
        .delete(table, &[Filter::eq("id", id), Filter::eq("user_id", user_id)])
        .await?;
    Ok(removed > 0)
}

/// Deletes a comment owned by `user_id`. `false` means nothing matched.
pub async fn delete_comment(
    store: &StoreClient,
    comment_id: &str,
    user_id: &str,
) -> Result<bool, StoreError> {
    delete_owned(store, "comments", comment_id, user_id).await
}

pub async fn delete_episode_comment(
    store: &StoreClient,
    comment_id: &str,
    user_id: &str,
) -> Result<bool, StoreError> {
    delete_owned(store, "episode_comments", comment_id, user_id).await
}

pub async fn delete_rating(
    store: &StoreClient,
    rating_id: &str,
    user_id: &str,
) -> Result<bool, StoreError> {
    delete_owned(store, "ratings", rating_id, user_id).await
}

pub async fn delete_episode_rating(
    store: &StoreClient,
    rating_id: &str,
    user_id: &str,
) -> Result<bool, StoreError> {
    delete_owned(store, "episode_ratings", rating_id, user_id).await
}

pub async fn user_profile(
    store: &StoreClient,
    user_id: &str,
) -> Result<Option<UserProfile>, StoreError> {
    let select = Select::from("users")
        .columns("id,username,bio,avatar_url")
        .eq("id", user_id);
    store.fetch_optional(&select).await
}

#[derive(Serialize)]
struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
}

fn profile_patch(update: &ProfileUpdate) -> Result<ProfilePatch, StoreError> {
    let username = match update.username.as_deref() {
        Some(raw) => {
            let name = sanitize_username(raw);
            if name.is_empty() {
                return Err(StoreError::InvalidInput(format!(
                    "username {:?} has no usable characters",
                    raw
                )));
            }
            Some(name)
        }
        None => None,
    };
    let cleared = |v: Option<&str>| v.map(sanitize_text).filter(|v| !v.is_empty());
    Ok(ProfilePatch {
        username,
        bio: cleared(update.bio.as_deref()),
        avatar_url: cleared(update.avatar_url.as_deref()),
    })
}

/// Writes the editable profile columns. `false` means no such user.
pub async fn update_profile(
    store: &StoreClient,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<bool, StoreError> {
    let patch = profile_patch(update)?;
    let updated = store
        .update("users", &patch, &[Filter::eq("id", user_id)])
        .await?;
    Ok(updated > 0)
}

// Newest first, at most ACTIVITY_LIMIT rows, each with its title embedded.
fn activity(table: &str, columns: &str, user_id: &str) -> Select {
    let columns = format!(
        "{},anime:anime_index!{}_anime_id_fkey(id,title,cover_image)",
        columns, table
    );
    Select::from(table)
        .columns(&columns)
        .eq("user_id", user_id)
        .order("created_at", false)
        .limit(ACTIVITY_LIMIT)
}

pub async fn user_ratings(store: &StoreClient, user_id: &str) -> Result<Vec<UserRating>, StoreError> {
    store
        .fetch(&activity("ratings", "id,rating,created_at", user_id))
        .await
}

pub async fn user_comments(
    store: &StoreClient,
    user_id: &str,
) -> Result<Vec<UserComment>, StoreError> {
    store
        .fetch(&activity("comments", "id,content,created_at", user_id))
        .await
}

pub async fn user_episode_ratings(
    store: &StoreClient,
    user_id: &str,
) -> Result<Vec<UserEpisodeRating>, StoreError> {
    let select = activity(
        "episode_ratings",
        "id,rating,episode_number,created_at",
        user_id,
    );
    store.fetch(&select).await
}

pub async fn user_episode_comments(
    store: &StoreClient,
    user_id: &str,
) -> Result<Vec<UserEpisodeComment>, StoreError> {
    let select = activity(
        "episode_comments",
        "id,content,episode_number,created_at",
        user_id,
    );
    store.fetch(&select).await
}

#[derive(Deserialize)]
struct ModerationRow {
    id: String,
    user_id: String,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    reported: bool,
    user: Option<UserEmbed>,
}

/// Title comments for moderators, newest first.
pub async fn moderation_queue(
    store: &StoreClient,
    filter: ModerationFilter,
) -> Result<Vec<ModeratedComment>, StoreError> {
    let mut select = Select::from("comments").columns(
        "id,user_id,content,created_at,reported,user:users!comments_user_id_fkey(username)",
    );
    if filter == ModerationFilter::Reported {
        select = select.eq("reported", true);
    }
    let rows: Vec<ModerationRow> = store.fetch(&select.order("created_at", false)).await?;
    Ok(rows
        .into_iter()
        .map(|c| ModeratedComment {
            id: c.id,
            user_id: c.user_id,
            content: c.content,
            created_at: c.created_at,
            reported: c.reported,
            user: user_or_anonymous(c.user),
        })
        .collect())
}

/// Clears the reported flag and keeps the comment.
pub async fn dismiss_report(store: &StoreClient, comment_id: &str) -> Result<bool, StoreError> {
    let updated = store
        .update(
            "comments",
            &json!({ "reported": false }),
            &[Filter::eq("id", comment_id)],
        )
        .await?;
    Ok(updated > 0)
}

/// Moderator delete: any author's comment.
pub async fn remove_comment(store: &StoreClient, comment_id: &str) -> Result<bool, StoreError> {
    let removed = store
        .delete("comments", &[Filter::eq("id", comment_id)])
        .await?;
    Ok(removed > 0)
}

pub async fn user_lists(store: &StoreClient, user_id: &str) -> Result<Vec<UserList>, StoreError> {
    let select = Select::from("lists")
        .columns(LIST_COLUMNS)
        .eq("user_id", user_id)
        .order("created_at", false)
        .limit(ACTIVITY_LIMIT);
    store.fetch(&select).await
}

pub async fn create_list(store: &StoreClient, list: &NewList) -> Result<UserList, StoreError> {
    let name = sanitize_input(&list.name, 100);
    if name.is_empty() {
        return Err(StoreError::InvalidInput("list name is empty".to_string()));
    }
    let description = list
        .description
        .as_deref()
        .map(|d| sanitize_input(d, 1000))
        .filter(|d| !d.is_empty());
    let row = NewList {
        user_id: list.user_id.clone(),
        name,
        description,
        is_private: list.is_private,
    };
    store.insert_returning("lists", &row, LIST_COLUMNS).await
}

pub async fn delete_list(
    store: &StoreClient,
    list_id: &str,
    user_id: &str,
) -> Result<bool, StoreError> {
    delete_owned(store, "lists", list_id, user_id).await
}

pub async fn add_to_list(
    store: &StoreClient,
    list_id: &str,
    anime_id: &str,
) -> Result<(), StoreError> {
    let row = json!({ "list_id": list_id, "anime_id": anime_id });
    store.insert("list_items", &row).await
}

pub async fn list_items(store: &StoreClient, list_id: &str) -> Result<Vec<ListItem>, StoreError> {
    let select = Select::from("list_items")
        .columns("id,anime_id,anime:anime_index!list_items_anime_id_fkey(id,title,cover_image)")
        .eq("list_id", list_id);
    store.fetch(&select).await
}
