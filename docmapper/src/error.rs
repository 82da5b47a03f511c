use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cast error: field '{field}' expected {expected}, got {value}")]
    Cast {
        field: String,
        expected: String,
        value: String,
    },

    #[error("Virtual assignment error on '{name}': {reason}")]
    VirtualAssignment { name: String, reason: String },

    #[error("Unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Aborted by pre hook: {reason}")]
    HookAbort { reason: String },

    #[error("Post hook for '{operation}' failed: {source}")]
    PostHook {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Operation '{operation}' cancelled (storage applied: {storage_applied})")]
    Cancelled {
        operation: String,
        storage_applied: bool,
    },

    #[error("Query context is sealed once execution begins")]
    QuerySealed,

    #[error("Document not found: {model}/{id}")]
    NotFound { model: String, id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// Build the error a pre hook returns to abort its operation.
    pub fn abort(reason: impl Into<String>) -> Self {
        Error::HookAbort {
            reason: reason.into(),
        }
    }

    /// True for every failure that originated in a storage backend.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Storage(_)
                | Error::Io(_)
                | Error::Yaml(_)
                | Error::Json(_)
                | Error::Sqlite(_)
                | Error::Glob(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
