//! Client for the hosted store's REST interface (PostgREST dialect).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::AnimeRow;

mod query;

pub use query::{parse_content_range_total, Filter, Select};

pub const ANIME_TABLE: &str = "anime_index";

const READ_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);
const DELETE_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const READ_RETRIES: u32 = 2;
const READ_BACKOFF: Duration = Duration::from_secs(1);

/// Timeout and retry settings applied to application reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub initial_backoff: Duration,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            timeout: READ_TIMEOUT,
            retries: READ_RETRIES,
            initial_backoff: READ_BACKOFF,
        }
    }
}

/// Where catalog rows end up.
#[async_trait]
pub trait AnimeStore: Send + Sync {
    /// Insert-or-overwrite keyed on `id`. Conflicting rows are fully replaced.
    async fn upsert_anime(&self, rows: &[AnimeRow]) -> Result<(), StoreError>;
}

/// Handle to one project. Create once and pass by reference.
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: Client,
    rest_url: String,
    api_key: HeaderValue,
    authorization: HeaderValue,
    read_policy: ReadPolicy,
}

impl StoreClient {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let user_agent = format!("anidex/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            api_key: secret_header("API key", &config.key)?,
            authorization: bearer_header(&config.key)?,
            read_policy: ReadPolicy::default(),
        })
    }

    /// Same project, but requests run as the signed-in user so row-level security applies to them.
    pub fn with_access_token(&self, token: &str) -> Result<Self, StoreError> {
        Ok(Self {
            authorization: bearer_header(token)?,
            ..self.clone()
        })
    }

    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", self.api_key.clone());
        headers.insert(AUTHORIZATION, self.authorization.clone());
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .headers(headers)
    }

    pub async fn fetch<T: DeserializeOwned>(&self, select: &Select) -> Result<Vec<T>, StoreError> {
        let (rows, _) = self.fetch_counted(select).await?;
        Ok(rows)
    }

    pub async fn fetch_optional<T: DeserializeOwned>(
        &self,
        select: &Select,
    ) -> Result<Option<T>, StoreError> {
        let select = select.clone().limit(1);
        let rows: Vec<T> = self.fetch(&select).await?;
        Ok(rows.into_iter().next())
    }

    /// Rows plus the exact total when the select asked for one.
    pub async fn fetch_counted<T: DeserializeOwned>(
        &self,
        select: &Select,
    ) -> Result<(Vec<T>, Option<u64>), StoreError> {
        let pairs = select.query_pairs();
        debug!("store select {} {:?}", select.table(), pairs);
        let res = self
            .with_read_retry(|| {
                let mut req = self
                    .request(Method::GET, select.table())
                    .query(&pairs)
                    .timeout(self.read_policy.timeout);
                if select.wants_count() {
                    req = req.header("Prefer", "count=exact");
                }
                async move {
                    match req.send().await {
                        Ok(res) => check(res).await,
                        Err(e) => Err(StoreError::from(e)),
                    }
                }
            })
            .await?;

        let count = res
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let rows = decode_body(res).await?;
        Ok((rows, count))
    }

    pub async fn insert<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> Result<(), StoreError> {
        let req = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .timeout(WRITE_TIMEOUT)
            .json(body);
        check(req.send().await?).await?;
        Ok(())
    }

    /// Inserts one row and reads back `columns` of the stored row.
    pub async fn insert_returning<B, T>(
        &self,
        table: &str,
        body: &B,
        columns: &str,
    ) -> Result<T, StoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self
            .request(Method::POST, table)
            .query(&[("select", columns)])
            .header("Prefer", "return=representation")
            .timeout(WRITE_TIMEOUT)
            .json(body);
        let res = check(req.send().await?).await?;
        let rows: Vec<T> = decode_body(res).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {} returned no row", table)))
    }

    /// Application upsert: bounded by the write timeout.
    pub async fn upsert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
        on_conflict: &str,
    ) -> Result<(), StoreError> {
        self.send_upsert(table, body, on_conflict, Some(WRITE_TIMEOUT))
            .await
    }

    async fn send_upsert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
        on_conflict: &str,
        timeout: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut req = self
            .request(Method::POST, table)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        check(req.send().await?).await?;
        Ok(())
    }

    /// Patches matching rows; returns how many were changed.
    pub async fn update<B: Serialize + ?Sized>(
        &self,
        table: &str,
        patch: &B,
        filters: &[Filter],
    ) -> Result<usize, StoreError> {
        let pairs = filter_pairs(filters)?;
        let req = self
            .request(Method::PATCH, table)
            .query(&pairs)
            .header("Prefer", "return=representation")
            .timeout(WRITE_TIMEOUT)
            .json(patch);
        affected_rows(check(req.send().await?).await?).await
    }

    /// Deletes matching rows; returns how many were removed.
    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize, StoreError> {
        let pairs = filter_pairs(filters)?;
        let req = self
            .request(Method::DELETE, table)
            .query(&pairs)
            .header("Prefer", "return=representation")
            .timeout(DELETE_TIMEOUT);
        affected_rows(check(req.send().await?).await?).await
    }

    /// Can we read one id from the catalog table? One attempt, bounded at five seconds.
    pub async fn check_connection(&self) -> bool {
        let select = Select::from(ANIME_TABLE).columns("id").limit(1);
        let req = self
            .request(Method::GET, select.table())
            .query(&select.query_pairs())
            .timeout(HEALTH_TIMEOUT);
        let result = match req.send().await {
            Ok(res) => check(res).await.map(|_| ()),
            Err(e) => Err(StoreError::from(e)),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Store connection check failed: {}", e);
                false
            }
        }
    }

    async fn with_read_retry<F, Fut, T>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.read_policy.retries => {
                    let delay = self.read_policy.initial_backoff * 2u32.pow(attempt);
                    warn!(
                        "Store read failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl AnimeStore for StoreClient {
    async fn upsert_anime(&self, rows: &[AnimeRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        // The sync job puts no deadline on its own writes.
        self.send_upsert(ANIME_TABLE, rows, "id", None).await
    }
}

fn secret_header(what: &str, value: &str) -> Result<HeaderValue, StoreError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        StoreError::InvalidInput(format!("{} contains characters not allowed in a header", what))
    })?;
    header.set_sensitive(true);
    Ok(header)
}

fn bearer_header(token: &str) -> Result<HeaderValue, StoreError> {
    secret_header("access token", &format!("Bearer {}", token))
}

// Unfiltered writes would hit the whole table.
fn filter_pairs(filters: &[Filter]) -> Result<Vec<(String, String)>, StoreError> {
    if filters.is_empty() {
        return Err(StoreError::InvalidInput(
            "refusing to write without a filter".to_string(),
        ));
    }
    Ok(filters.iter().map(Filter::pair).collect())
}

#[derive(Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    code: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

async fn check(res: Response) -> Result<Response, StoreError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    let body: Option<PostgrestErrorBody> = serde_json::from_str(&text).ok();
    let (message, code, details, hint) = match body {
        Some(b) => (b.message, b.code, b.details, b.hint),
        None => (None, None, None, None),
    };
    let message = message
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    Err(StoreError::Rejected {
        status,
        message,
        code,
        details,
        hint,
    })
}

async fn decode_body<T: DeserializeOwned>(res: Response) -> Result<T, StoreError> {
    let bytes = res.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

async fn affected_rows(res: Response) -> Result<usize, StoreError> {
    let rows: Vec<serde_json::Value> = decode_body(res).await?;
    Ok(rows.len())
}
