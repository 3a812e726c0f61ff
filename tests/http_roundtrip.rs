use anidex::anilist::{AniListClient, CatalogSource};
use anidex::catalog;
use anidex::config::StoreConfig;
use anidex::error::{StoreError, SyncError};
use anidex::models::{AnimeFilters, AnimeStatus, ModerationFilter, NewList, ProfileUpdate};
use anidex::store::{AnimeStore, ReadPolicy, StoreClient};
use anidex::sync::{SyncJob, SyncOptions, SyncState};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

// ---------------------------------------------------------------------------
// AniList stand-in

struct FakeAniList {
    pages: Vec<Value>,
    calls: AtomicUsize,
    last_body: Mutex<Option<Value>>,
}

async fn anilist_graphql(
    State(fake): State<Arc<FakeAniList>>,
    Json(body): Json<Value>,
) -> Response {
    fake.calls.fetch_add(1, Ordering::SeqCst);
    let page = body["variables"]["page"].as_u64().unwrap_or(1) as usize;
    *fake.last_body.lock().unwrap() = Some(body);
    match fake.pages.get(page - 1) {
        Some(v) => Json(v.clone()).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no such page").into_response(),
    }
}

async fn spawn_anilist(pages: Vec<Value>) -> (String, Arc<FakeAniList>) {
    let fake = Arc::new(FakeAniList {
        pages,
        calls: AtomicUsize::new(0),
        last_body: Mutex::new(None),
    });
    let router = Router::new()
        .route("/", axum::routing::post(anilist_graphql))
        .with_state(fake.clone());
    (spawn(router).await, fake)
}

fn media_json(id: i64) -> Value {
    json!({
        "id": id,
        "title": { "romaji": format!("Romaji {}", id), "english": null },
        "averageScore": 81,
        "genres": ["Drama"],
        "startDate": { "year": 2020 },
        "season": "WINTER",
        "status": "NOT_YET_RELEASED",
        "episodes": 12,
        "description": "Line one<br>Line two",
        "coverImage": { "large": format!("https://img/{}.jpg", id) },
        "bannerImage": null,
        "trailer": null
    })
}

fn anilist_page(ids: std::ops::Range<i64>, current: u32, has_next: bool) -> Value {
    json!({
        "data": {
            "Page": {
                "pageInfo": { "total": 60, "currentPage": current, "hasNextPage": has_next },
                "media": ids.map(media_json).collect::<Vec<_>>()
            }
        }
    })
}

#[tokio::test]
async fn anilist_client_sends_page_variables() {
    let (url, fake) = spawn_anilist(vec![anilist_page(1..4, 1, true)]).await;
    let client = AniListClient::with_endpoint(url).unwrap();

    let page = client.fetch_page(1, 3).await.unwrap();

    assert_eq!(page.media.len(), 3);
    assert!(page.has_next_page);
    assert_eq!(page.total, Some(60));
    let body = fake.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["variables"], json!({ "page": 1, "perPage": 3 }));
    assert!(body["query"].as_str().unwrap().contains("POPULARITY_DESC"));
}

#[tokio::test]
async fn anilist_graphql_errors_are_protocol_errors() {
    let (url, _) = spawn_anilist(vec![json!({
        "data": null,
        "errors": [{ "message": "Too Many Requests.", "status": 429 }]
    })])
    .await;
    let client = AniListClient::with_endpoint(url).unwrap();

    let err = client.fetch_page(1, 50).await.unwrap_err();
    assert!(matches!(err, SyncError::SourceProtocol { page: 1, .. }), "{:?}", err);
}

#[tokio::test]
async fn anilist_http_failure_is_unavailable() {
    let (url, _) = spawn_anilist(vec![]).await;
    let client = AniListClient::with_endpoint(url).unwrap();

    let err = client.fetch_page(1, 50).await.unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable { page: 1, .. }), "{:?}", err);
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn anilist_unreachable_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = AniListClient::with_endpoint(format!("http://{}", addr)).unwrap();

    let err = client.fetch_page(3, 50).await.unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable { page: 3, .. }), "{:?}", err);
}

// ---------------------------------------------------------------------------
// PostgREST stand-in

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: String,
}

impl Recorded {
    fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Responder = dyn Fn(&Recorded) -> (StatusCode, HeaderMap, String) + Send + Sync;

struct FakeRest {
    requests: Mutex<Vec<Recorded>>,
    respond: Box<Responder>,
}

impl FakeRest {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(fake): State<Arc<FakeRest>>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let req = Recorded {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    };
    let response = (fake.respond)(&req);
    fake.requests.lock().unwrap().push(req);
    response.into_response()
}

async fn spawn_rest<F>(respond: F) -> (StoreClient, Arc<FakeRest>)
where
    F: Fn(&Recorded) -> (StatusCode, HeaderMap, String) + Send + Sync + 'static,
{
    let fake = Arc::new(FakeRest {
        requests: Mutex::new(Vec::new()),
        respond: Box::new(respond),
    });
    let router = Router::new().fallback(record).with_state(fake.clone());
    let url = spawn(router).await;
    let config = StoreConfig {
        url,
        key: "service-key".to_string(),
    };
    let client = StoreClient::new(&config).unwrap().with_read_policy(ReadPolicy {
        timeout: Duration::from_secs(5),
        retries: 0,
        initial_backoff: Duration::ZERO,
    });
    (client, fake)
}

fn ok_json(body: Value) -> (StatusCode, HeaderMap, String) {
    (StatusCode::OK, HeaderMap::new(), body.to_string())
}

fn row_json(id: &str, rating: f64) -> Value {
    json!({
        "id": id,
        "title": format!("Title {}", id),
        "rating": rating,
        "genres": ["Action"],
        "year": 2024,
        "season": "Spring",
        "status": "airing",
        "episodes": 12,
        "description": null,
        "cover_image": "https://img/x.jpg",
        "banner_image": null,
        "trailer": null,
        "anilist_id": 1
    })
}

#[tokio::test]
async fn upsert_targets_anime_index_with_overwrite() {
    let (store, fake) = spawn_rest(|_| (StatusCode::CREATED, HeaderMap::new(), String::new())).await;
    let first: anidex::models::AnimeRow =
        serde_json::from_value(row_json("anilist-1", 8.1)).unwrap();
    let second: anidex::models::AnimeRow =
        serde_json::from_value(row_json("anilist-2", 7.4)).unwrap();

    store.upsert_anime(&[first, second]).await.unwrap();
    store.upsert_anime(&[]).await.unwrap();

    let reqs = fake.requests();
    assert_eq!(reqs.len(), 1, "empty batch must not send a request");
    let req = &reqs[0];
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.path, "/rest/v1/anime_index");
    assert_eq!(req.param("on_conflict"), Some("id"));
    assert_eq!(
        req.header("prefer"),
        Some("resolution=merge-duplicates,return=minimal")
    );
    assert_eq!(req.header("apikey"), Some("service-key"));
    assert_eq!(req.header("authorization"), Some("Bearer service-key"));
    let body: Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["status"], json!("airing"));
}

#[tokio::test]
async fn upsert_rejection_is_decoded() {
    let (store, _) = spawn_rest(|_| {
        (
            StatusCode::UNAUTHORIZED,
            HeaderMap::new(),
            json!({ "message": "JWT expired", "code": "PGRST301", "details": null, "hint": null })
                .to_string(),
        )
    })
    .await;
    let row: anidex::models::AnimeRow = serde_json::from_value(row_json("anilist-1", 8.1)).unwrap();

    let err = store.upsert_anime(&[row]).await.unwrap_err();
    match err {
        StoreError::Rejected {
            status,
            message,
            code,
            ..
        } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "JWT expired");
            assert_eq!(code.as_deref(), Some("PGRST301"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn paginated_browse_reads_exact_count() {
    let (store, fake) = spawn_rest(|_| {
        let mut headers = HeaderMap::new();
        headers.insert("content-range", HeaderValue::from_static("24-47/50"));
        let rows = json!([row_json("anilist-1", 9.0), row_json("anilist-2", 8.0)]);
        (StatusCode::PARTIAL_CONTENT, headers, rows.to_string())
    })
    .await;

    let filters = AnimeFilters {
        status: Some("airing".to_string()),
        query: Some("  frieren ".to_string()),
        genres: vec!["Fantasy".to_string(), "Slice of Life".to_string()],
        ..Default::default()
    };
    let page = catalog::anime_list_paginated(&store, &filters, 2, 24).await.unwrap();

    assert_eq!(page.total_count, 50);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_more);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].status, AnimeStatus::Airing);

    let req = &fake.requests()[0];
    assert_eq!(req.method, Method::GET);
    assert_eq!(req.path, "/rest/v1/anime_index");
    assert_eq!(req.param("status"), Some("eq.airing"));
    assert_eq!(req.param("title"), Some("ilike.*frieren*"));
    assert_eq!(req.param("genres"), Some("ov.{\"Fantasy\",\"Slice of Life\"}"));
    assert_eq!(req.param("order"), Some("rating.desc"));
    assert_eq!(req.param("offset"), Some("24"));
    assert_eq!(req.param("limit"), Some("24"));
    assert_eq!(req.header("prefer"), Some("count=exact"));
}

#[tokio::test]
async fn anime_by_id_returns_none_when_missing() {
    let (store, fake) = spawn_rest(|_| ok_json(json!([]))).await;

    let found = catalog::anime_by_id(&store, "anilist-404").await.unwrap();

    assert!(found.is_none());
    let req = &fake.requests()[0];
    assert_eq!(req.param("id"), Some("eq.anilist-404"));
    assert_eq!(req.param("limit"), Some("1"));
}

#[tokio::test]
async fn reviews_join_ratings_and_default_missing_fields() {
    let (store, fake) = spawn_rest(|req| match req.path.as_str() {
        "/rest/v1/comments" => ok_json(json!([
            {
                "id": "c2", "anime_id": "anilist-1", "user_id": "u2",
                "content": "Second", "created_at": "2024-05-02T10:00:00+00:00",
                "user": null
            },
            {
                "id": "c1", "anime_id": "anilist-1", "user_id": "u1",
                "content": "First", "created_at": "2024-05-01T10:00:00+00:00",
                "user": { "username": "mika", "avatar_url": null }
            }
        ])),
        "/rest/v1/ratings" => ok_json(json!([{ "user_id": "u1", "rating": 9 }])),
        _ => (StatusCode::NOT_FOUND, HeaderMap::new(), String::new()),
    })
    .await;

    let reviews = catalog::anime_reviews(&store, "anilist-1").await.unwrap();

    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0].id, "c2");
    assert_eq!(reviews[0].rating, 0.0);
    assert_eq!(reviews[0].user.username, "Anonymous");
    assert_eq!(reviews[1].rating, 9.0);
    assert_eq!(reviews[1].user.username, "mika");

    let reqs = fake.requests();
    assert_eq!(
        reqs[0].param("select"),
        Some("id,anime_id,user_id,content,created_at,user:users!comments_user_id_fkey(username,avatar_url)")
    );
    assert_eq!(reqs[0].param("order"), Some("created_at.desc"));
    assert_eq!(reqs[1].param("anime_id"), Some("eq.anilist-1"));
}

#[tokio::test]
async fn blank_search_and_empty_comment_send_nothing() {
    let (store, fake) = spawn_rest(|_| ok_json(json!([]))).await;

    assert!(catalog::search_suggestions(&store, "   ", 10).await.unwrap().is_empty());
    let err = catalog::post_comment(&store, "u1", "anilist-1", "\u{200B}  ")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn user_writes_use_access_token_and_conflict_keys() {
    let (store, fake) = spawn_rest(|req| match req.method {
        Method::DELETE => ok_json(json!([{ "id": "c1" }])),
        _ => (StatusCode::CREATED, HeaderMap::new(), String::new()),
    })
    .await;
    let user_store = store.with_access_token("user-jwt").unwrap();

    catalog::rate_anime(&user_store, "u1", "anilist-1", 8.0).await.unwrap();
    catalog::post_comment(&user_store, "u1", "anilist-1", "  Great show\0 ")
        .await
        .unwrap();
    let removed = catalog::delete_comment(&user_store, "c1", "u1").await.unwrap();

    assert!(removed);
    let reqs = fake.requests();
    assert_eq!(reqs.len(), 3);

    assert_eq!(reqs[0].path, "/rest/v1/ratings");
    assert_eq!(reqs[0].param("on_conflict"), Some("user_id,anime_id"));
    assert_eq!(reqs[0].header("authorization"), Some("Bearer user-jwt"));
    assert_eq!(reqs[0].header("apikey"), Some("service-key"));

    let comment: Value = serde_json::from_str(&reqs[1].body).unwrap();
    assert_eq!(comment["content"], json!("Great show"));

    assert_eq!(reqs[2].method, Method::DELETE);
    assert_eq!(reqs[2].param("id"), Some("eq.c1"));
    assert_eq!(reqs[2].param("user_id"), Some("eq.u1"));
}

#[tokio::test]
async fn create_list_reads_back_the_stored_row() {
    let (store, fake) = spawn_rest(|_| {
        (
            StatusCode::CREATED,
            HeaderMap::new(),
            json!([{
                "id": "l1", "name": "Favorites", "description": null,
                "is_private": true, "created_at": "2024-06-01T00:00:00+00:00"
            }])
            .to_string(),
        )
    })
    .await;

    let list = catalog::create_list(
        &store,
        &NewList {
            user_id: "u1".to_string(),
            name: "  Favorites ".to_string(),
            description: Some("   ".to_string()),
            is_private: true,
        },
    )
    .await
    .unwrap();

    assert_eq!(list.id, "l1");
    let req = &fake.requests()[0];
    assert_eq!(req.header("prefer"), Some("return=representation"));
    let body: Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body["name"], json!("Favorites"));
    assert!(body["description"].is_null());
}

#[tokio::test]
async fn connection_check_reports_failure() {
    let (store, _) = spawn_rest(|_| (StatusCode::SERVICE_UNAVAILABLE, HeaderMap::new(), String::new())).await;
    assert!(!store.check_connection().await);

    let (store, fake) = spawn_rest(|_| ok_json(json!([{ "id": "anilist-1" }]))).await;
    assert!(store.check_connection().await);
    assert_eq!(fake.requests()[0].param("select"), Some("id"));
}

#[tokio::test]
async fn connection_check_is_a_single_attempt() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let config = StoreConfig {
        url: format!("http://{}", addr),
        key: "service-key".to_string(),
    };
    // A retried read would back off for at least ten seconds here.
    let store = StoreClient::new(&config).unwrap().with_read_policy(ReadPolicy {
        timeout: Duration::from_secs(10),
        retries: 2,
        initial_backoff: Duration::from_secs(5),
    });

    let started = std::time::Instant::now();
    assert!(!store.check_connection().await);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn huge_page_number_is_rejected_without_a_request() {
    let (store, fake) = spawn_rest(|_| ok_json(json!([]))).await;

    let err = catalog::anime_list_paginated(&store, &AnimeFilters::default(), u64::MAX / 2, 24)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)), "{:?}", err);

    let err = catalog::anime_list_paginated(&store, &AnimeFilters::default(), 2, u64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)), "{:?}", err);

    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn owners_delete_their_ratings_and_episode_items() {
    let (store, fake) = spawn_rest(|req| match req.param("id") {
        Some("eq.gone") => ok_json(json!([])),
        Some(id) => ok_json(json!([{ "id": id.trim_start_matches("eq.") }])),
        None => (StatusCode::BAD_REQUEST, HeaderMap::new(), String::new()),
    })
    .await;

    assert!(catalog::delete_rating(&store, "r1", "u1").await.unwrap());
    assert!(catalog::delete_episode_rating(&store, "er1", "u1").await.unwrap());
    assert!(catalog::delete_episode_comment(&store, "ec1", "u1").await.unwrap());
    assert!(!catalog::delete_episode_comment(&store, "gone", "u1").await.unwrap());

    let reqs = fake.requests();
    let targets: Vec<_> = reqs
        .iter()
        .map(|r| (r.method.clone(), r.path.as_str(), r.param("user_id")))
        .collect();
    assert_eq!(
        targets,
        vec![
            (Method::DELETE, "/rest/v1/ratings", Some("eq.u1")),
            (Method::DELETE, "/rest/v1/episode_ratings", Some("eq.u1")),
            (Method::DELETE, "/rest/v1/episode_comments", Some("eq.u1")),
            (Method::DELETE, "/rest/v1/episode_comments", Some("eq.u1")),
        ]
    );
    assert_eq!(reqs[1].param("id"), Some("eq.er1"));
    assert_eq!(reqs[0].header("prefer"), Some("return=representation"));
}

#[tokio::test]
async fn profile_loads_and_saves_trimmed_fields() {
    let (store, fake) = spawn_rest(|req| match req.method {
        Method::GET => ok_json(json!([{
            "id": "u1", "username": "mika", "bio": null, "avatar_url": "https://a/m.png"
        }])),
        _ => ok_json(json!([{ "id": "u1" }])),
    })
    .await;

    let profile = catalog::user_profile(&store, "u1").await.unwrap().unwrap();
    assert_eq!(profile.username.as_deref(), Some("mika"));
    assert!(profile.bio.is_none());

    let saved = catalog::update_profile(
        &store,
        "u1",
        &ProfileUpdate {
            username: Some(" mika chan ".to_string()),
            bio: Some("  Watching everything\u{200B}  ".to_string()),
            avatar_url: Some("   ".to_string()),
        },
    )
    .await
    .unwrap();
    assert!(saved);

    let reqs = fake.requests();
    assert_eq!(reqs[0].path, "/rest/v1/users");
    assert_eq!(reqs[0].param("select"), Some("id,username,bio,avatar_url"));
    assert_eq!(reqs[0].param("id"), Some("eq.u1"));
    assert_eq!(reqs[1].method, Method::PATCH);
    assert_eq!(reqs[1].param("id"), Some("eq.u1"));
    let body: Value = serde_json::from_str(&reqs[1].body).unwrap();
    assert_eq!(
        body,
        json!({ "username": "mikachan", "bio": "Watching everything", "avatar_url": null })
    );
}

#[tokio::test]
async fn activity_lists_embed_titles_and_cap_rows() {
    let (store, fake) = spawn_rest(|req| match req.path.as_str() {
        "/rest/v1/ratings" => ok_json(json!([{
            "id": "r1", "rating": 9, "created_at": "2024-05-01T10:00:00+00:00",
            "anime": { "id": "anilist-1", "title": "Frieren", "cover_image": null }
        }])),
        "/rest/v1/episode_comments" => ok_json(json!([{
            "id": "ec1", "content": "Wow", "episode_number": 3,
            "created_at": "2024-05-01T10:00:00+00:00", "anime": null
        }])),
        _ => ok_json(json!([])),
    })
    .await;

    let ratings = catalog::user_ratings(&store, "u1").await.unwrap();
    let comments = catalog::user_comments(&store, "u1").await.unwrap();
    let episode_ratings = catalog::user_episode_ratings(&store, "u1").await.unwrap();
    let episode_comments = catalog::user_episode_comments(&store, "u1").await.unwrap();

    assert_eq!(ratings[0].rating, 9.0);
    assert_eq!(ratings[0].anime.as_ref().unwrap().title, "Frieren");
    assert!(comments.is_empty());
    assert!(episode_ratings.is_empty());
    assert_eq!(episode_comments[0].episode_number, 3);

    let reqs = fake.requests();
    assert_eq!(reqs.len(), 4);
    assert_eq!(
        reqs[0].param("select"),
        Some("id,rating,created_at,anime:anime_index!ratings_anime_id_fkey(id,title,cover_image)")
    );
    assert_eq!(
        reqs[3].param("select"),
        Some("id,content,episode_number,created_at,anime:anime_index!episode_comments_anime_id_fkey(id,title,cover_image)")
    );
    for req in &reqs {
        assert_eq!(req.param("user_id"), Some("eq.u1"));
        assert_eq!(req.param("order"), Some("created_at.desc"));
        assert_eq!(req.param("limit"), Some("100"));
    }
}

#[tokio::test]
async fn moderators_review_dismiss_and_remove_comments() {
    let (store, fake) = spawn_rest(|req| match req.method {
        Method::GET => ok_json(json!([{
            "id": "c9", "user_id": "u2", "content": "spam",
            "created_at": "2024-05-01T10:00:00+00:00", "reported": true,
            "user": { "username": "bot" }
        }])),
        _ => ok_json(json!([{ "id": "c9" }])),
    })
    .await;

    let reported = catalog::moderation_queue(&store, ModerationFilter::Reported)
        .await
        .unwrap();
    catalog::moderation_queue(&store, ModerationFilter::All)
        .await
        .unwrap();
    assert!(catalog::dismiss_report(&store, "c9").await.unwrap());
    assert!(catalog::remove_comment(&store, "c9").await.unwrap());

    assert!(reported[0].reported);
    assert_eq!(reported[0].user.username, "bot");

    let reqs = fake.requests();
    assert_eq!(reqs[0].param("reported"), Some("eq.true"));
    assert_eq!(reqs[1].param("reported"), None);
    assert_eq!(reqs[1].param("order"), Some("created_at.desc"));

    assert_eq!(reqs[2].method, Method::PATCH);
    assert_eq!(reqs[2].path, "/rest/v1/comments");
    assert_eq!(reqs[2].param("id"), Some("eq.c9"));
    let patch: Value = serde_json::from_str(&reqs[2].body).unwrap();
    assert_eq!(patch, json!({ "reported": false }));

    assert_eq!(reqs[3].method, Method::DELETE);
    assert_eq!(reqs[3].param("id"), Some("eq.c9"));
    assert_eq!(reqs[3].param("user_id"), None);
}

#[tokio::test]
async fn rejected_reads_are_not_retried() {
    let (store, fake) = spawn_rest(|_| {
        (
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            json!({ "message": "column anime_index.nope does not exist", "code": "42703" })
                .to_string(),
        )
    })
    .await;
    let store = store.with_read_policy(ReadPolicy {
        timeout: Duration::from_secs(5),
        retries: 2,
        initial_backoff: Duration::ZERO,
    });

    let err = catalog::trending(&store, 6).await.unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(fake.requests().len(), 1);
    assert_eq!(fake.requests()[0].param("limit"), Some("6"));
}

// ---------------------------------------------------------------------------
// Whole job over HTTP

#[tokio::test]
async fn sync_job_mirrors_catalog_over_http() {
    let (anilist_url, anilist) = spawn_anilist(vec![
        anilist_page(1..51, 1, true),
        anilist_page(51..61, 2, false),
    ])
    .await;
    let (store, rest) =
        spawn_rest(|_| (StatusCode::CREATED, HeaderMap::new(), String::new())).await;
    let source = AniListClient::with_endpoint(anilist_url).unwrap();

    let options = SyncOptions {
        per_page: 50,
        page_delay: Duration::ZERO,
    };
    let report = SyncJob::new(&source, &store, options).run().await;

    assert_eq!(report.state, SyncState::Done);
    assert_eq!(report.total_synced, 60);
    assert_eq!(anilist.calls.load(Ordering::SeqCst), 2);

    let upserts = rest.requests();
    assert_eq!(upserts.len(), 2);
    let second: Value = serde_json::from_str(&upserts[1].body).unwrap();
    let rows = second.as_array().unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0]["id"], json!("anilist-51"));
    assert_eq!(rows[0]["title"], json!("Romaji 51"));
    assert_eq!(rows[0]["rating"], json!(8.1));
    assert_eq!(rows[0]["status"], json!("upcoming"));
    assert_eq!(rows[0]["season"], json!("Winter"));
    assert_eq!(rows[0]["description"], json!("Line oneLine two"));
    assert!(rows[0]["trailer"].is_null());
}
