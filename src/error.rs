use std::fmt;

#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),
    ConfigurationError(String),
    /// The input could not be opened or read at all
    SourceError(String),
    /// A materialized view failed to refresh after the row data was committed
    RefreshError { view: String, message: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SourceError(msg) => write!(f, "Source error: {}", msg),
            AppError::RefreshError { view, message } => write!(
                f,
                "Failed to refresh materialized view {} (row data is committed): {}",
                view, message
            ),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Whether the failure happened after the row data was already committed.
    pub fn is_post_commit(&self) -> bool {
        matches!(self, AppError::RefreshError { .. })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::SourceError(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::SourceError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
