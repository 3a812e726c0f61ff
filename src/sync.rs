//! Mirrors the AniList popularity catalog into `anime_index`, one page at a time.
//!
//! The loop is strictly sequential and fail-fast: the first error ends the run,
//! pages already upserted stay in the store, and a re-run converges because
//! rows are keyed by their namespaced AniList id.

use std::time::Duration;
use tracing::{debug, error, info};

use crate::anilist::{to_anime_row, CatalogSource};
use crate::config::{SyncConfig, DEFAULT_PAGE_DELAY, DEFAULT_PER_PAGE};
use crate::error::SyncError;
use crate::models::AnimeRow;
use crate::store::AnimeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub per_page: u32,
    pub page_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            per_page: config.per_page,
            page_delay: config.page_delay,
        }
    }
}

/// Where a run currently is. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    FetchingPage(u32),
    Transforming(u32),
    Upserting(u32),
    Done,
    Failed(u32),
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Done | SyncState::Failed(_))
    }
}

#[derive(Debug)]
pub struct SyncReport {
    pub state: SyncState,
    /// Pages whose upsert succeeded.
    pub pages_synced: u32,
    pub total_synced: usize,
    pub error: Option<SyncError>,
}

impl SyncReport {
    pub fn succeeded(&self) -> bool {
        self.state == SyncState::Done
    }
}

pub struct SyncJob<'a> {
    source: &'a dyn CatalogSource,
    store: &'a dyn AnimeStore,
    options: SyncOptions,
    state: SyncState,
}

impl<'a> SyncJob<'a> {
    pub fn new(
        source: &'a dyn CatalogSource,
        store: &'a dyn AnimeStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    fn transition(&mut self, next: SyncState) {
        debug!("sync state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs the page loop to completion. Errors end the run and are returned in the report.
    pub async fn run(&mut self) -> SyncReport {
        let mut page: u32 = 1;
        let mut pages_synced: u32 = 0;
        let mut total_synced: usize = 0;

        info!("Starting AniList sync...");

        loop {
            match self.sync_page(page).await {
                Ok(PageOutcome::Empty) => {
                    info!("No more data to fetch");
                    break;
                }
                Ok(PageOutcome::Synced { count, has_next }) => {
                    pages_synced += 1;
                    total_synced += count;
                    info!("Synced {} anime so far...", total_synced);
                    if !has_next {
                        break;
                    }
                    page += 1;
                    if !self.options.page_delay.is_zero() {
                        tokio::time::sleep(self.options.page_delay).await;
                    }
                }
                Err(e) => {
                    error!("Error syncing page {}: {}", page, error_chain(&e));
                    self.transition(SyncState::Failed(page));
                    info!("Sync stopped. Total anime synced: {}", total_synced);
                    return SyncReport {
                        state: self.state,
                        pages_synced,
                        total_synced,
                        error: Some(e),
                    };
                }
            }
        }

        self.transition(SyncState::Done);
        info!("Sync complete! Total anime synced: {}", total_synced);
        SyncReport {
            state: self.state,
            pages_synced,
            total_synced,
            error: None,
        }
    }

    async fn sync_page(&mut self, page: u32) -> Result<PageOutcome, SyncError> {
        self.transition(SyncState::FetchingPage(page));
        info!("Fetching page {}...", page);
        let fetched = self.source.fetch_page(page, self.options.per_page).await?;
        if fetched.media.is_empty() {
            return Ok(PageOutcome::Empty);
        }

        self.transition(SyncState::Transforming(page));
        let rows: Vec<AnimeRow> = fetched.media.iter().map(to_anime_row).collect();

        self.transition(SyncState::Upserting(page));
        info!("Syncing {} anime to the store...", rows.len());
        self.store
            .upsert_anime(&rows)
            .await
            .map_err(|source| SyncError::Persistence { page, source })?;

        Ok(PageOutcome::Synced {
            count: rows.len(),
            has_next: fetched.has_next_page,
        })
    }
}

enum PageOutcome {
    Empty,
    Synced { count: usize, has_next: bool },
}

fn error_chain(err: &SyncError) -> String {
    let mut msg = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    msg
}
