//! Error types for the reconciler.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the reconciler.
#[derive(Error, Debug)]
pub enum Error {
    // Credential errors
    #[error("AList credentials missing. Set ALIST_TOKEN or ALIST_USER + ALIST_PASS")]
    AlistCredentialsMissing,

    #[error("AList base URL not configured. Set ALIST_URL or [alist].base_url")]
    AlistUrlMissing,

    #[error("TMDB API key not configured. Set TMDB_KEY environment variable")]
    TmdbApiKeyMissing,

    #[error("No library roots configured. Pass --roots or set TV_ROOTS")]
    NoLibraryRoots,

    // Remote errors
    #[error("AList login failed: {0}")]
    AlistLoginFailed(String),

    #[error("AList API error on {path}: code {code}: {message}")]
    AlistApi {
        path: String,
        code: i64,
        message: String,
    },

    #[error("TMDB request failed: {0}")]
    TmdbRequest(String),

    // File system errors
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid skip-dir regex: {0}")]
    InvalidSkipRegex(String),

    // Ledger errors
    #[error("Invalid undo ledger: {0}")]
    InvalidUndoLedger(String),

    #[error("Refusing to undo without --yes")]
    UndoNotConfirmed,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // TOML errors
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .map(|s| s.as_u16() == 429 || s.is_server_error())
                        .unwrap_or(false)
            }
            Error::AlistApi { code, .. } => matches!(code, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}
