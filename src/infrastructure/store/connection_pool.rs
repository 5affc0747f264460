use super::schema::SCHEMA;
use crate::shared::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct ConnectionPool {
    pool: SqlitePool,
}

impl ConnectionPool {
    /// Opens the store and applies the schema. A file that fails the integrity
    /// check is discarded and recreated empty.
    pub async fn open(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let path = file_path(database_url, options.get_filename());
        if let Some(parent) = path
            .as_deref()
            .and_then(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }

        match Self::connect_checked(options.clone(), max_connections).await {
            Ok(pool) => Ok(pool),
            Err(AppError::Corrupt(reason)) => {
                let Some(path) = path else {
                    return Err(AppError::Corrupt(reason));
                };
                tracing::error!(
                    path = %path.display(),
                    reason = %reason,
                    "local store is unreadable; discarding it and starting empty"
                );
                remove_database_files(&path)?;
                Self::connect_checked(options, max_connections).await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn from_memory() -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let pool = Self { pool };
        pool.initialize().await?;
        Ok(pool)
    }

    async fn connect_checked(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        let pool = Self { pool };

        let verdict: String = sqlx::query_scalar("PRAGMA quick_check")
            .fetch_one(&pool.pool)
            .await?;
        if verdict != "ok" {
            pool.close().await;
            return Err(AppError::Corrupt(verdict));
        }

        pool.initialize().await?;
        Ok(pool)
    }

    async fn initialize(&self) -> Result<(), AppError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn file_path(database_url: &str, filename: &Path) -> Option<PathBuf> {
    if database_url.contains(":memory:") || database_url.contains("mode=memory") {
        return None;
    }
    Some(filename.to_path_buf())
}

fn remove_database_files(path: &Path) -> Result<(), AppError> {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(suffix);
        let candidate = PathBuf::from(candidate);
        if candidate.exists() {
            std::fs::remove_file(&candidate)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn url_for(path: &Path) -> String {
        format!("sqlite://{}?mode=rwc", path.display())
    }

    #[tokio::test]
    async fn garbage_file_is_replaced_with_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offline.db");
        std::fs::write(&path, vec![0x5a_u8; 8192]).unwrap();

        let pool = ConnectionPool::open(&url_for(&path), 1).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(pool.get_pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn reopening_keeps_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offline.db");

        let first = ConnectionPool::open(&url_for(&path), 1).await.unwrap();
        sqlx::query("INSERT INTO settings (key, value, updated_at) VALUES ('k', '1', 0)")
            .execute(first.get_pool())
            .await
            .unwrap();
        first.close().await;

        let second = ConnectionPool::open(&url_for(&path), 1).await.unwrap();
        let value: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'k'")
            .fetch_one(second.get_pool())
            .await
            .unwrap();
        assert_eq!(value, "1");
    }
}
