use std::env;
use std::time::Duration;

use tracing::info;

use crate::anilist::{ANILIST_ENDPOINT, MAX_PER_PAGE};
use crate::error::SyncError;

pub const DEFAULT_PER_PAGE: u32 = 50;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

const URL_VARS: [&str; 2] = ["VITE_SUPABASE_URL", "SUPABASE_URL"];
// Privileged key first: the sync job writes through row-level security.
const KEY_VARS: [&str; 3] = [
    "SUPABASE_SERVICE_ROLE_KEY",
    "VITE_SUPABASE_KEY",
    "SUPABASE_ANON_KEY",
];

/// Connection settings for the hosted store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = first_set(&lookup, &URL_VARS).ok_or_else(|| {
            SyncError::configuration(format!(
                "Missing required environment variable: {}",
                URL_VARS.join(" or ")
            ))
        })?;
        let key = first_set(&lookup, &KEY_VARS).ok_or_else(|| {
            SyncError::configuration(format!(
                "Missing required environment variable: {}",
                KEY_VARS.join(" or ")
            ))
        })?;

        let url = url.trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::configuration(format!(
                "Store URL must be http(s): {}",
                url
            )));
        }
        Ok(Self { url, key })
    }
}

/// Everything the sync binary needs before it touches the network.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub store: StoreConfig,
    pub anilist_endpoint: String,
    pub per_page: u32,
    pub page_delay: Duration,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = StoreConfig::from_lookup(&lookup)?;

        let anilist_endpoint = first_set(&lookup, &["ANILIST_ENDPOINT"])
            .unwrap_or_else(|| ANILIST_ENDPOINT.to_string());

        let per_page = match first_set(&lookup, &["ANIDEX_SYNC_PER_PAGE"]) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_PER_PAGE).contains(n))
                .ok_or_else(|| {
                    SyncError::configuration(format!(
                        "ANIDEX_SYNC_PER_PAGE must be between 1 and {}, got '{}'",
                        MAX_PER_PAGE, raw
                    ))
                })?,
            None => DEFAULT_PER_PAGE,
        };

        let page_delay = match first_set(&lookup, &["ANIDEX_SYNC_DELAY_MS"]) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| {
                    SyncError::configuration(format!(
                        "ANIDEX_SYNC_DELAY_MS must be a number of milliseconds, got '{}'",
                        raw
                    ))
                })?,
            None => DEFAULT_PAGE_DELAY,
        };

        info!(
            "Sync configured: store={}, source={}, per_page={}, delay={:?}",
            store.url, anilist_endpoint, per_page, page_delay
        );

        Ok(Self {
            store,
            anilist_endpoint,
            per_page,
            page_delay,
        })
    }
}

fn first_set<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(name))
        .find(|v| !v.trim().is_empty())
}
