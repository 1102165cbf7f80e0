//! Errors raised by the client, the CLI and the HTTP fetcher.

use pews_core::PewsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Core(#[from] PewsError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        ClientError::LoggingInit(error.to_string())
    }

    /// Collapse into the core's fetch-failure kind for `path`.
    pub fn into_fetch_failure(self, path: &str) -> PewsError {
        match self {
            ClientError::Core(e) => e,
            other => PewsError::FetchFailure {
                path: path.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_becomes_fetch_failure() {
        let err = ClientError::Status {
            url: "http://x/20240101000000.b".into(),
            status: 404,
        };
        let core = err.into_fetch_failure("20240101000000.b");
        assert!(core.is_fetch_failure());
        assert_eq!(
            core.to_string(),
            "fetch failed for 20240101000000.b: http://x/20240101000000.b returned HTTP 404"
        );
    }

    #[test]
    fn test_core_error_passes_through() {
        let err = ClientError::from(PewsError::InvalidTimeKey("x".into()));
        assert!(matches!(
            err.into_fetch_failure("p"),
            PewsError::InvalidTimeKey(_)
        ));
    }

    #[test]
    fn test_logging_init_message() {
        let err = ClientError::logging_init("subscriber already set");
        assert_eq!(
            err.to_string(),
            "failed to initialize logging: subscriber already set"
        );
    }
}
