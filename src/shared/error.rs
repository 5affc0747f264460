use thiserror::Error;

const SQLITE_CORRUPT: i64 = 11;
const SQLITE_FULL: i64 = 13;
const SQLITE_NOTADB: i64 = 26;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Store is corrupt: {0}")]
    Corrupt(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Offline: {0}")]
    Offline(String),

    #[error("Server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps an HTTP status that is not 2xx onto the error taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            AppError::Rejected { status, message }
        } else {
            AppError::Server { status, message }
        }
    }

    /// Failures that are expected to clear on their own: connectivity, 5xx,
    /// request timeout and throttling.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Network(_) | AppError::Offline(_) | AppError::Server { .. } => true,
            AppError::Rejected { status, .. } => matches!(status, 408 | 429),
            _ => false,
        }
    }

    /// Whether the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        self.is_transient() || matches!(self, AppError::QuotaExceeded(_))
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, AppError::Rejected { .. }) && !self.is_transient()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Rejected { status, .. } | AppError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn sqlite_primary_code(err: &sqlx::Error) -> Option<i64> {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i64>().ok())
            .map(|code| code & 0xff),
        _ => None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match sqlite_primary_code(&err) {
            Some(SQLITE_FULL) => AppError::QuotaExceeded(err.to_string()),
            Some(SQLITE_CORRUPT) | Some(SQLITE_NOTADB) => AppError::Corrupt(err.to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AppError::from_status(status.as_u16(), err.to_string()),
            None => AppError::Network(err.to_string()),
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ValidationError(format!("Invalid URL: {err}"))
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
