use crate::application::ports::fetcher::{FetchRequest, FetchResponse, Fetcher};
use crate::application::ports::local_store::ResponseCacheStore;
use crate::domain::entities::CachedResponse;
use crate::domain::value_objects::{FetchStrategy, PriorityTier};
use crate::infrastructure::cache::MemoryTier;
use crate::shared::clock::Clock;
use crate::shared::config::CacheConfig;
use crate::shared::error::AppError;
use bytes::Bytes;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;
use url::form_urlencoded;

const CRITICAL_SEGMENTS: &[&str] = &["safety", "berths", "alerts", "emergency"];
const MARITIME_SEGMENTS: &[&str] = &[
    "vessels",
    "berth-assignments",
    "operations",
    "cargo",
    "weather",
    "stevedores",
    "equipment",
];
const STATIC_EXTENSIONS: &[&str] = &[
    "js", "mjs", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff", "woff2", "ttf",
    "map", "webmanifest",
];
const STATIC_PREFIXES: &[&str] = &["/static/", "/assets/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteClass {
    pub strategy: FetchStrategy,
    pub tier: PriorityTier,
}

impl RouteClass {
    const fn new(strategy: FetchStrategy, tier: PriorityTier) -> Self {
        Self { strategy, tier }
    }
}

fn api_segment(path: &str) -> Option<&str> {
    path.strip_prefix("/api/")
        .and_then(|rest| rest.split('/').next())
        .filter(|segment| !segment.is_empty())
}

fn segment_matches(segment: &str, names: &[&str]) -> bool {
    names.iter().any(|name| {
        segment == *name
            || segment
                .strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('-'))
    })
}

fn is_static_asset(path: &str) -> bool {
    if STATIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }
    path.rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .is_some_and(|(_, ext)| STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Maps a request path onto its fetch strategy and cache tier. The first
/// matching rule wins.
pub fn classify(path: &str) -> RouteClass {
    if let Some(segment) = api_segment(path) {
        if segment_matches(segment, CRITICAL_SEGMENTS) {
            return RouteClass::new(FetchStrategy::CriticalNetworkFirst, PriorityTier::Critical);
        }
        if segment_matches(segment, MARITIME_SEGMENTS) {
            return RouteClass::new(FetchStrategy::NetworkFirst, PriorityTier::High);
        }
        return RouteClass::new(FetchStrategy::NetworkFirst, PriorityTier::General);
    }
    if is_static_asset(path) {
        return RouteClass::new(FetchStrategy::CacheFirst, PriorityTier::Static);
    }
    RouteClass::new(FetchStrategy::StaleWhileRevalidate, PriorityTier::General)
}

/// Request identity: method, lowercased origin, path and sorted query.
/// The fragment never takes part.
pub fn cache_key(method: &str, url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    pairs.sort();

    let origin = url.origin().ascii_serialization().to_ascii_lowercase();
    let mut key = format!("{} {}{}", method.to_ascii_uppercase(), origin, url.path());
    if !pairs.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        key.push('?');
        key.push_str(&query);
    }
    key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
}

#[derive(Debug)]
pub struct RoutedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub source: ResponseSource,
    pub stale: bool,
    pub offline: bool,
    pub cached_at: Option<i64>,
    /// Background refresh started for a stale-while-revalidate hit.
    pub revalidation: Option<JoinHandle<()>>,
}

impl RoutedResponse {
    fn from_network(response: FetchResponse) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type,
            body: response.body,
            source: ResponseSource::Network,
            stale: false,
            offline: false,
            cached_at: None,
            revalidation: None,
        }
    }

    fn from_cache(entry: CachedResponse, source: ResponseSource, stale: bool, offline: bool) -> Self {
        let body = tag_json_body(&entry, stale, offline);
        Self {
            status: entry.status,
            content_type: entry.content_type,
            body,
            source,
            stale,
            offline,
            cached_at: Some(entry.timestamp),
            revalidation: None,
        }
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| value.to_ascii_lowercase().contains("json"))
}

/// Adds `_stale`, `_offline` and `_cachedAt` to cached JSON objects.
fn tag_json_body(entry: &CachedResponse, stale: bool, offline: bool) -> Bytes {
    if !is_json(entry.content_type.as_deref()) {
        return entry.data.clone();
    }
    let Ok(Value::Object(mut map)) = serde_json::from_slice::<Value>(&entry.data) else {
        return entry.data.clone();
    };
    map.insert("_stale".into(), Value::Bool(stale));
    map.insert("_offline".into(), Value::Bool(offline));
    map.insert("_cachedAt".into(), Value::from(entry.timestamp));
    match serde_json::to_vec(&Value::Object(map)) {
        Ok(tagged) => Bytes::from(tagged),
        Err(_) => entry.data.clone(),
    }
}

/// Serves reads through the tiered cache.
#[derive(Clone)]
pub struct CacheRouter {
    store: Arc<dyn ResponseCacheStore>,
    fetcher: Arc<dyn Fetcher>,
    memory: Arc<MemoryTier>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl CacheRouter {
    pub fn new(
        store: Arc<dyn ResponseCacheStore>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            memory: Arc::new(MemoryTier::new(config.memory_entries)),
            clock,
            config,
        }
    }

    pub fn cache_name(&self, tier: PriorityTier) -> String {
        format!("{}-{}", tier.as_str(), self.config.version)
    }

    /// Cache names that belong to the running version.
    pub fn current_cache_names(&self) -> Vec<String> {
        [
            PriorityTier::Critical,
            PriorityTier::High,
            PriorityTier::General,
            PriorityTier::Static,
        ]
        .into_iter()
        .map(|tier| self.cache_name(tier))
        .collect()
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    fn ttl_ms(&self, tier: PriorityTier) -> Option<i64> {
        let seconds = match tier {
            PriorityTier::Critical => self.config.critical_ttl,
            PriorityTier::High => self.config.high_ttl,
            PriorityTier::General => self.config.general_ttl,
            PriorityTier::Static => return None,
        };
        Some(seconds_to_ms(seconds))
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn handle(&self, request: FetchRequest) -> Result<RoutedResponse, AppError> {
        if !request.is_get() {
            let response = self.fetcher.fetch(&request).await?;
            return Ok(RoutedResponse::from_network(response));
        }

        let class = classify(request.url.path());
        tracing::trace!(strategy = %class.strategy, tier = %class.tier, "routing request");
        match class.strategy {
            FetchStrategy::CacheFirst => self.cache_first(&request, class.tier).await,
            FetchStrategy::NetworkFirst => self.network_first(&request, class.tier, None).await,
            FetchStrategy::CriticalNetworkFirst => {
                let budget = seconds_to_ms(self.config.critical_stale_budget);
                self.network_first(&request, class.tier, Some(budget)).await
            }
            FetchStrategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(&request, class.tier).await
            }
        }
    }

    async fn cache_first(
        &self,
        request: &FetchRequest,
        tier: PriorityTier,
    ) -> Result<RoutedResponse, AppError> {
        let cache_name = self.cache_name(tier);
        let key = cache_key(&request.method, &request.url);
        let cached = self.lookup(&cache_name, &key).await;

        if let Some(entry) = cached
            .as_ref()
            .filter(|entry| entry.is_fresh_at(self.clock.now_ms()))
        {
            return Ok(RoutedResponse::from_cache(
                entry.clone(),
                ResponseSource::Cache,
                false,
                false,
            ));
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.remember(&cache_name, &key, tier, &response).await;
                Ok(RoutedResponse::from_network(response))
            }
            Err(err) => match cached {
                Some(entry) => Ok(RoutedResponse::from_cache(
                    entry,
                    ResponseSource::Cache,
                    true,
                    true,
                )),
                None => self.offline_fallback(request, err).await,
            },
        }
    }

    /// Network first. With a budget, cached data older than the budget is
    /// reported stale; otherwise staleness follows the entry's TTL.
    async fn network_first(
        &self,
        request: &FetchRequest,
        tier: PriorityTier,
        stale_budget_ms: Option<i64>,
    ) -> Result<RoutedResponse, AppError> {
        let cache_name = self.cache_name(tier);
        let key = cache_key(&request.method, &request.url);

        let failure = match self.fetcher.fetch(request).await {
            Ok(response) if response.status < 500 => {
                self.remember(&cache_name, &key, tier, &response).await;
                return Ok(RoutedResponse::from_network(response));
            }
            Ok(response) => {
                let status = response.status;
                if let Some(entry) = self.lookup(&cache_name, &key).await {
                    let stale = self.is_stale(&entry, stale_budget_ms);
                    tracing::debug!(status, "server error; serving cached copy");
                    return Ok(RoutedResponse::from_cache(
                        entry,
                        ResponseSource::Cache,
                        stale,
                        false,
                    ));
                }
                return Ok(RoutedResponse::from_network(response));
            }
            Err(err) => err,
        };

        if let Some(entry) = self.lookup(&cache_name, &key).await {
            let stale = self.is_stale(&entry, stale_budget_ms);
            return Ok(RoutedResponse::from_cache(
                entry,
                ResponseSource::Cache,
                stale,
                true,
            ));
        }
        self.offline_fallback(request, failure).await
    }

    async fn stale_while_revalidate(
        &self,
        request: &FetchRequest,
        tier: PriorityTier,
    ) -> Result<RoutedResponse, AppError> {
        let cache_name = self.cache_name(tier);
        let key = cache_key(&request.method, &request.url);

        if let Some(entry) = self.lookup(&cache_name, &key).await {
            let stale = !entry.is_fresh_at(self.clock.now_ms());
            let mut routed =
                RoutedResponse::from_cache(entry, ResponseSource::Cache, stale, false);

            let router = self.clone();
            let request = request.clone();
            routed.revalidation = Some(tokio::spawn(async move {
                match router.fetcher.fetch(&request).await {
                    Ok(response) => router.remember(&cache_name, &key, tier, &response).await,
                    Err(err) => {
                        tracing::debug!(error = %err, url = %request.url, "background revalidation failed");
                    }
                }
            }));
            return Ok(routed);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.remember(&cache_name, &key, tier, &response).await;
                Ok(RoutedResponse::from_network(response))
            }
            Err(err) => self.offline_fallback(request, err).await,
        }
    }

    fn is_stale(&self, entry: &CachedResponse, stale_budget_ms: Option<i64>) -> bool {
        let now = self.clock.now_ms();
        match stale_budget_ms {
            Some(budget) => entry.age_at(now) > budget,
            None => !entry.is_fresh_at(now),
        }
    }

    async fn offline_fallback(
        &self,
        request: &FetchRequest,
        failure: AppError,
    ) -> Result<RoutedResponse, AppError> {
        if let Ok(fallback_url) = request.url.join(&self.config.offline_fallback) {
            let cache_name = self.cache_name(PriorityTier::Static);
            let key = cache_key("GET", &fallback_url);
            if let Some(entry) = self.lookup(&cache_name, &key).await {
                return Ok(RoutedResponse::from_cache(
                    entry,
                    ResponseSource::OfflineFallback,
                    true,
                    true,
                ));
            }
        }
        tracing::debug!(url = %request.url, error = %failure, "no cached copy while offline");
        Err(AppError::Offline(format!(
            "{} unavailable: {failure}",
            request.url
        )))
    }

    /// Memory tier first, then the persisted cache. Store failures count as misses.
    async fn lookup(&self, cache_name: &str, key: &str) -> Option<CachedResponse> {
        if let Some(entry) = self.memory.get(cache_name, key) {
            return Some(entry);
        }
        match self.store.get_cached(cache_name, key).await {
            Ok(Some(entry)) => {
                self.memory.put(entry.clone());
                Some(entry)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, cache = cache_name, "cache read failed; using network only");
                None
            }
        }
    }

    async fn remember(
        &self,
        cache_name: &str,
        key: &str,
        tier: PriorityTier,
        response: &FetchResponse,
    ) {
        if !response.is_cacheable() {
            return;
        }
        let entry = CachedResponse::new(
            key.to_string(),
            cache_name.to_string(),
            response.body.clone(),
            response.content_type.clone(),
            response.status,
            self.clock.now_ms(),
            self.ttl_ms(tier),
            tier.is_critical(),
        );
        self.memory.put(entry.clone());
        if let Err(err) = self.store.put_cached(entry).await {
            tracing::warn!(error = %err, cache = cache_name, "cache write failed; using network only");
        }
    }

    /// Fetches and stores each URL. API routes go to their own tier; anything
    /// else is app shell and lands in the static cache.
    pub async fn precache(&self, urls: &[Url]) -> Result<usize, AppError> {
        let responses = try_join_all(urls.iter().map(|url| async move {
            let response = self.fetcher.fetch(&FetchRequest::get(url.clone())).await?;
            Ok::<_, AppError>((url, response))
        }))
        .await?;

        let mut stored = 0;
        for (url, response) in responses {
            if !response.is_cacheable() {
                tracing::warn!(url = %url, status = response.status, "precache skipped uncacheable response");
                continue;
            }
            let tier = match api_segment(url.path()) {
                Some(_) => classify(url.path()).tier,
                None => PriorityTier::Static,
            };
            let key = cache_key("GET", url);
            self.remember(&self.cache_name(tier), &key, tier, &response)
                .await;
            stored += 1;
        }
        Ok(stored)
    }

    pub async fn clear_cache(&self, cache_name: &str) -> Result<u64, AppError> {
        self.memory.remove_cache(cache_name);
        self.store.delete_cache(cache_name).await
    }

    /// Drops every cache that does not belong to the running version.
    pub async fn rotate(&self) -> Result<Vec<String>, AppError> {
        let keep = self.current_cache_names();
        let mut removed = Vec::new();
        for name in self.store.cache_names().await? {
            if !keep.contains(&name) {
                self.clear_cache(&name).await?;
                removed.push(name);
            }
        }
        if !removed.is_empty() {
            tracing::info!(removed = ?removed, version = %self.config.version, "rotated caches");
        }
        Ok(removed)
    }
}

fn seconds_to_ms(seconds: u64) -> i64 {
    i64::try_from(seconds.saturating_mul(1_000)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_endpoints_use_critical_network_first() {
        for path in ["/api/safety/incidents", "/api/berths", "/api/alerts/7", "/api/emergency"] {
            assert_eq!(
                classify(path),
                RouteClass::new(FetchStrategy::CriticalNetworkFirst, PriorityTier::Critical),
                "{path}"
            );
        }
    }

    #[test]
    fn maritime_endpoints_are_high_tier() {
        for path in [
            "/api/vessels",
            "/api/berth-assignments/3",
            "/api/operations",
            "/api/cargo-zones",
            "/api/weather/now",
            "/api/stevedores",
            "/api/equipment/cranes",
        ] {
            assert_eq!(
                classify(path),
                RouteClass::new(FetchStrategy::NetworkFirst, PriorityTier::High),
                "{path}"
            );
        }
    }

    #[test]
    fn other_paths_fall_through_the_table() {
        assert_eq!(
            classify("/api/tasks"),
            RouteClass::new(FetchStrategy::NetworkFirst, PriorityTier::General)
        );
        assert_eq!(
            classify("/static/css/app.css"),
            RouteClass::new(FetchStrategy::CacheFirst, PriorityTier::Static)
        );
        assert_eq!(
            classify("/logo.PNG"),
            RouteClass::new(FetchStrategy::CacheFirst, PriorityTier::Static)
        );
        assert_eq!(
            classify("/dashboard"),
            RouteClass::new(FetchStrategy::StaleWhileRevalidate, PriorityTier::General)
        );
        assert_eq!(
            classify("/api/"),
            RouteClass::new(FetchStrategy::StaleWhileRevalidate, PriorityTier::General)
        );
    }

    #[test]
    fn cache_key_normalizes_request_identity() {
        let a = Url::parse("http://PORT.local/api/tasks?b=2&a=1#top").unwrap();
        let b = Url::parse("http://port.local/api/tasks?a=1&b=2").unwrap();
        assert_eq!(cache_key("get", &a), cache_key("GET", &b));
        assert_eq!(cache_key("GET", &b), "GET http://port.local/api/tasks?a=1&b=2");

        let other_path = Url::parse("http://port.local/api/Tasks?a=1&b=2").unwrap();
        assert_ne!(cache_key("GET", &other_path), cache_key("GET", &b));
    }

    #[test]
    fn json_tagging_only_touches_objects() {
        let object = CachedResponse::new(
            "k".into(),
            "api-v1".into(),
            Bytes::from_static(br#"{"berth":4}"#),
            Some("application/json".into()),
            200,
            42,
            Some(1),
            false,
        );
        let tagged: Value = serde_json::from_slice(&tag_json_body(&object, true, false)).unwrap();
        assert_eq!(tagged["_stale"], Value::Bool(true));
        assert_eq!(tagged["_offline"], Value::Bool(false));
        assert_eq!(tagged["_cachedAt"], Value::from(42));

        let mut list = object.clone();
        list.data = Bytes::from_static(b"[1,2]");
        assert_eq!(tag_json_body(&list, true, true), list.data);
    }
}
