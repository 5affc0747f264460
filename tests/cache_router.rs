mod common;

use common::{FakeFetcher, memory_store};
use std::sync::Arc;
use stevedore_sync::application::ports::fetcher::{FetchRequest, Fetcher};
use stevedore_sync::application::ports::local_store::ResponseCacheStore;
use stevedore_sync::application::services::{CacheRouter, ResponseSource};
use stevedore_sync::domain::entities::CachedResponse;
use stevedore_sync::infrastructure::store::SqliteLocalStore;
use stevedore_sync::shared::clock::ManualClock;
use stevedore_sync::shared::config::AppConfig;
use stevedore_sync::shared::error::AppError;
use url::Url;

const T0: i64 = 1_760_000_000_000;
const BASE: &str = "http://ops.example";

fn url(path: &str) -> Url {
    Url::parse(BASE).unwrap().join(path).unwrap()
}

fn get(path: &str) -> FetchRequest {
    FetchRequest::get(url(path))
}

fn router(
    store: Arc<SqliteLocalStore>,
    fetcher: Arc<FakeFetcher>,
    clock: Arc<ManualClock>,
) -> CacheRouter {
    CacheRouter::new(
        store as Arc<dyn ResponseCacheStore>,
        fetcher as Arc<dyn Fetcher>,
        clock,
        AppConfig::default().cache,
    )
}

#[tokio::test]
async fn critical_data_turns_stale_after_two_minutes() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let clock = ManualClock::new(T0);
    let router = router(store, fetcher.clone(), clock.clone());
    fetcher
        .respond_json(url("/api/berths").as_str(), serde_json::json!({"berths": [1, 2]}))
        .await;

    let live = router.handle(get("/api/berths")).await.unwrap();
    assert_eq!(live.source, ResponseSource::Network);

    fetcher.set_offline(true);
    clock.advance(100_000);
    let fresh = router.handle(get("/api/berths")).await.unwrap();
    assert_eq!(fresh.source, ResponseSource::Cache);
    assert!(!fresh.stale);
    assert!(fresh.offline);
    let body = fresh.json().unwrap();
    assert_eq!(body["_stale"], false);
    assert_eq!(body["_cachedAt"], T0);

    clock.set(T0 + 121_000);
    let stale = router.handle(get("/api/berths")).await.unwrap();
    assert!(stale.stale);
    assert_eq!(stale.json().unwrap()["_stale"], true);
    assert_eq!(stale.json().unwrap()["berths"][1], 2);
}

#[tokio::test]
async fn critical_entries_expire_from_the_store_after_ttl() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let clock = ManualClock::new(T0);
    let router = router(store.clone(), fetcher.clone(), clock.clone());
    fetcher
        .respond_json(url("/api/safety/incidents").as_str(), serde_json::json!({"open": 0}))
        .await;
    router.handle(get("/api/safety/incidents")).await.unwrap();

    let name = router.cache_name(stevedore_sync::domain::value_objects::PriorityTier::Critical);
    let key = stevedore_sync::application::services::cache_router::cache_key(
        "GET",
        &url("/api/safety/incidents"),
    );
    let entry: CachedResponse = store.get_cached(&name, &key).await.unwrap().unwrap();
    assert!(entry.critical);
    assert_eq!(entry.ttl, Some(120_000));
    assert!(entry.is_fresh_at(T0 + 100_000));
    assert!(!entry.is_fresh_at(T0 + 121_000));
}

#[tokio::test]
async fn server_errors_fall_back_to_cached_copy() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let clock = ManualClock::new(T0);
    let router = router(store, fetcher.clone(), clock.clone());
    let vessels = url("/api/vessels?page=1&sort=eta");
    fetcher
        .respond_json(vessels.as_str(), serde_json::json!({"items": ["MV Horizon"]}))
        .await;
    router.handle(FetchRequest::get(vessels.clone())).await.unwrap();

    fetcher
        .respond(vessels.as_str(), 502, "text/plain", "bad gateway")
        .await;
    let served = router.handle(FetchRequest::get(vessels)).await.unwrap();
    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.status, 200);
    assert!(!served.offline);
    assert_eq!(served.json().unwrap()["items"][0], "MV Horizon");
}

#[tokio::test]
async fn query_order_does_not_split_the_cache() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let router = router(store, fetcher.clone(), ManualClock::new(T0));
    fetcher
        .respond_json(
            url("/api/vessels?page=1&sort=eta").as_str(),
            serde_json::json!({"items": []}),
        )
        .await;
    router.handle(get("/api/vessels?page=1&sort=eta")).await.unwrap();

    fetcher.set_offline(true);
    let served = router.handle(get("/api/vessels?sort=eta&page=1")).await.unwrap();
    assert_eq!(served.source, ResponseSource::Cache);
}

#[tokio::test]
async fn static_assets_are_served_from_cache_first() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let router = router(store, fetcher.clone(), ManualClock::new(T0));
    let script = url("/static/app.js");
    fetcher
        .respond(script.as_str(), 200, "application/javascript", "console.log(1)")
        .await;

    router.handle(get("/static/app.js")).await.unwrap();
    let second = router.handle(get("/static/app.js")).await.unwrap();
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(fetcher.hits(script.as_str()).await, 1);
    assert_eq!(&second.body[..], b"console.log(1)");
}

#[tokio::test]
async fn pages_revalidate_in_the_background() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let router = router(store, fetcher.clone(), ManualClock::new(T0));
    let page = url("/dashboard");
    fetcher.respond(page.as_str(), 200, "text/html", "<p>v1</p>").await;
    router.handle(get("/dashboard")).await.unwrap();

    fetcher.respond(page.as_str(), 200, "text/html", "<p>v2</p>").await;
    let mut cached = router.handle(get("/dashboard")).await.unwrap();
    assert_eq!(cached.source, ResponseSource::Cache);
    assert_eq!(&cached.body[..], b"<p>v1</p>");
    cached.revalidation.take().unwrap().await.unwrap();

    let mut refreshed = router.handle(get("/dashboard")).await.unwrap();
    assert_eq!(&refreshed.body[..], b"<p>v2</p>");
    refreshed.revalidation.take().unwrap().await.unwrap();
    assert_eq!(fetcher.hits(page.as_str()).await, 3);
}

#[tokio::test]
async fn offline_miss_uses_the_offline_page() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let router = router(store, fetcher.clone(), ManualClock::new(T0));
    fetcher
        .respond(url("/offline.html").as_str(), 200, "text/html", "offline")
        .await;
    assert_eq!(router.precache(&[url("/offline.html")]).await.unwrap(), 1);

    fetcher.set_offline(true);
    let served = router.handle(get("/api/tasks")).await.unwrap();
    assert_eq!(served.source, ResponseSource::OfflineFallback);
    assert_eq!(&served.body[..], b"offline");
}

#[tokio::test]
async fn offline_miss_without_fallback_is_an_offline_error() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let router = router(store, fetcher.clone(), ManualClock::new(T0));
    fetcher.set_offline(true);

    let err = router.handle(get("/api/tasks")).await.unwrap_err();
    assert!(matches!(err, AppError::Offline(_)));
}

#[tokio::test]
async fn rotation_drops_caches_from_older_versions() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    let clock = ManualClock::new(T0);
    store
        .put_cached(CachedResponse::new(
            "GET http://ops.example/api/tasks".into(),
            "general-v0".into(),
            bytes::Bytes::from_static(b"{}"),
            Some("application/json".into()),
            200,
            T0,
            Some(60_000),
            false,
        ))
        .await
        .unwrap();
    let router = router(store.clone(), fetcher, clock);

    let removed = router.rotate().await.unwrap();
    assert_eq!(removed, vec!["general-v0".to_string()]);
    assert!(store.cache_names().await.unwrap().is_empty());
}
