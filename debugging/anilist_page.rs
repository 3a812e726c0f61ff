//! Fetch one page of the AniList popularity catalog and print the rows the sync job would upsert.
//! Usage:
//!   cargo run --bin anilist_page -- [page] [per_page]
//! Nothing is written to the store.

use anidex::anilist::{to_anime_row, AniListClient, CatalogSource, MAX_PER_PAGE};
use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

fn parse_args() -> Result<(u32, u32)> {
    let mut args = env::args().skip(1);
    let page = match args.next() {
        Some(v) => v.parse().context("page must be a positive integer")?,
        None => 1,
    };
    let per_page = match args.next() {
        Some(v) => v.parse().context("per_page must be a positive integer")?,
        None => 5,
    };
    if page == 0 || per_page == 0 || per_page > MAX_PER_PAGE {
        anyhow::bail!("page must be >= 1 and per_page between 1 and {}", MAX_PER_PAGE);
    }
    Ok((page, per_page))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let (page, per_page) = parse_args()?;
    let client = match env::var("ANILIST_ENDPOINT") {
        Ok(endpoint) => AniListClient::with_endpoint(endpoint)?,
        Err(_) => AniListClient::new()?,
    };

    let fetched = client.fetch_page(page, per_page).await?;
    eprintln!(
        "{} page {} ({} records, total {:?}, has_next_page {})",
        client.endpoint(),
        fetched.current_page,
        fetched.media.len(),
        fetched.total,
        fetched.has_next_page
    );
    for media in &fetched.media {
        let row = to_anime_row(media);
        println!("{}", serde_json::to_string_pretty(&row)?);
    }
    Ok(())
}
