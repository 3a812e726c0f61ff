use super::client::{Media, MediaTitle, Trailer};
use super::text::clean_description;
use crate::models::{AnimeRow, AnimeStatus, Season};

/// Namespace for rows that originate from AniList.
pub const ID_PREFIX: &str = "anilist";

const YOUTUBE_SITE: &str = "youtube";

/// Store key for an AniList title. Stable across syncs.
pub fn canonical_id(anilist_id: i32) -> String {
    format!("{}-{}", ID_PREFIX, anilist_id)
}

/// Normalizes one AniList title into an `anime_index` row.
pub fn to_anime_row(media: &Media) -> AnimeRow {
    AnimeRow {
        id: canonical_id(media.id),
        title: choose_title(media.title.as_ref()),
        rating: rescale_rating(media.average_score),
        genres: media.genres.clone().unwrap_or_default(),
        year: media.start_date.as_ref().and_then(|d| d.year),
        season: Season::from_anilist(media.season.as_deref()),
        status: AnimeStatus::from_anilist(media.status.as_deref()),
        episodes: media.episodes,
        description: clean_description(media.description.as_deref()),
        cover_image: media.cover_image.as_ref().and_then(|c| c.large.clone()),
        banner_image: media.banner_image.clone(),
        trailer: media.trailer.as_ref().and_then(trailer_url),
        anilist_id: Some(media.id),
    }
}

fn choose_title(title: Option<&MediaTitle>) -> String {
    let non_blank = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    title
        .and_then(|t| non_blank(&t.english).or_else(|| non_blank(&t.romaji)))
        .unwrap_or_else(|| "Unknown Title".to_string())
}

/// AniList scores are 0..=100; the store keeps 0..=10.
fn rescale_rating(average_score: Option<i32>) -> Option<f64> {
    average_score.map(|s| f64::from(s.clamp(0, 100)) / 10.0)
}

fn trailer_url(trailer: &Trailer) -> Option<String> {
    let id = trailer.id.as_deref().filter(|id| !id.is_empty())?;
    if trailer.site.as_deref() == Some(YOUTUBE_SITE) {
        return Some(format!("https://www.youtube.com/watch?v={}", id));
    }
    None
}
