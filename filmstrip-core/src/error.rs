use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Source file not found: {0}")]
    SourceMissing(String),

    #[error("Could not probe media: {0}")]
    NotProbable(String),

    #[error("{tool} exited with status {code}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("Failed to parse tool output: {0}")]
    ParseFailed(String),

    #[error("Could not materialize info side-file for {0}")]
    InfoFailed(String),

    #[error("Database busy after exhausting retries: {0}")]
    DbBusy(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Database corrupt: {0}")]
    DbCorrupt(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// True for transient SQLite lock contention that the retry helper
    /// should absorb.
    pub fn is_db_busy(&self) -> bool {
        match self {
            MediaError::Db(sqlx::Error::Database(db)) => {
                matches!(
                    db.code().as_deref(),
                    // SQLITE_BUSY, SQLITE_BUSY_SNAPSHOT, SQLITE_LOCKED
                    Some("5") | Some("517") | Some("6")
                )
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
