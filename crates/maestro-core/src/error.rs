use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid iteration state: {0}")]
    InvalidState(String),

    #[error("Memory entry is not text: {0}")]
    InvalidEntry(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<tempfile::PersistError> for CoreError {
    fn from(err: tempfile::PersistError) -> Self {
        CoreError::Persist {
            path: err.file.path().display().to_string(),
            source: err.error,
        }
    }
}
