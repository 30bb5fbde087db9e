use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Fetch and Evaluation abort the affected import pair (and, per the
/// orchestrator's documented policy, the whole run). Persistence during a
/// snapshot replace rolls the transaction back; during a history append it
/// is logged by the caller and swallowed. Validation is raised before any
/// database access.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to evaluate script from {url}: {reason}")]
    Evaluation { url: String, reason: String },

    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
