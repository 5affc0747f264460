use super::ConnectionPool;
use crate::shared::error::AppError;
use chrono::{DateTime, TimeZone, Utc};

mod alerts;
mod cache;
mod drafts;
mod queries;
mod queue;
mod records;

pub struct SqliteLocalStore {
    pool: ConnectionPool,
}

impl SqliteLocalStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub async fn health_check(&self) -> Result<bool, AppError> {
        let result = sqlx::query("SELECT 1")
            .fetch_one(self.pool.get_pool())
            .await;
        Ok(result.is_ok())
    }

    /// Waits for in-flight statements and closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, AppError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| AppError::SerializationError(format!("Invalid timestamp: {millis}")))
}

#[cfg(test)]
pub(crate) async fn memory_store() -> SqliteLocalStore {
    let pool = ConnectionPool::from_memory().await.unwrap();
    SqliteLocalStore::new(pool)
}
