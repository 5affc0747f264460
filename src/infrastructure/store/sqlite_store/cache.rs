use super::SqliteLocalStore;
use super::queries::{
    COUNT_CACHED, DELETE_CACHE, DELETE_EXPIRED_CACHED, SELECT_CACHE_NAMES, SELECT_CACHED,
    UPSERT_CACHED,
};
use crate::application::ports::local_store::ResponseCacheStore;
use crate::domain::entities::CachedResponse;
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct CachedRow {
    cache_name: String,
    cache_key: String,
    data: Vec<u8>,
    content_type: Option<String>,
    status: i64,
    timestamp: i64,
    ttl: Option<i64>,
    expires: Option<i64>,
    critical: bool,
}

impl CachedRow {
    fn into_domain(self) -> CachedResponse {
        CachedResponse {
            key: self.cache_key,
            cache_name: self.cache_name,
            data: Bytes::from(self.data),
            content_type: self.content_type,
            status: u16::try_from(self.status).unwrap_or(200),
            timestamp: self.timestamp,
            ttl: self.ttl,
            expires: self.expires,
            critical: self.critical,
        }
    }
}

#[async_trait]
impl ResponseCacheStore for SqliteLocalStore {
    async fn get_cached(
        &self,
        cache_name: &str,
        key: &str,
    ) -> Result<Option<CachedResponse>, AppError> {
        let row = sqlx::query_as::<_, CachedRow>(SELECT_CACHED)
            .bind(cache_name)
            .bind(key)
            .fetch_optional(self.pool.get_pool())
            .await?;
        Ok(row.map(CachedRow::into_domain))
    }

    async fn put_cached(&self, entry: CachedResponse) -> Result<(), AppError> {
        sqlx::query(UPSERT_CACHED)
            .bind(&entry.cache_name)
            .bind(&entry.key)
            .bind(entry.data.as_ref())
            .bind(&entry.content_type)
            .bind(i64::from(entry.status))
            .bind(entry.timestamp)
            .bind(entry.ttl)
            .bind(entry.expires)
            .bind(entry.critical)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn cache_names(&self) -> Result<Vec<String>, AppError> {
        let names = sqlx::query_scalar::<_, String>(SELECT_CACHE_NAMES)
            .fetch_all(self.pool.get_pool())
            .await?;
        Ok(names)
    }

    async fn delete_cache(&self, cache_name: &str) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_CACHE)
            .bind(cache_name)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self, before_ms: i64) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_EXPIRED_CACHED)
            .bind(before_ms)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn cached_count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(COUNT_CACHED)
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(count)
    }
}
