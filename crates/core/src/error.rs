use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KinscopeError {
    #[error("File name does not match household_<ID>_day<N>.mp4: {file_name}")]
    FilenamePatternMismatch { file_name: String },

    #[error("Video directory {path} cannot be read: {source}")]
    InventoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Analysis service unavailable during {operation}: {reason}")]
    ServiceUnavailable { operation: String, reason: String },

    #[error("Analysis service rejected {operation} (HTTP {status}): {body}")]
    ServiceRejected {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Indexing failed for task {task_id}: {reason}")]
    IndexingFailed { task_id: String, reason: String },

    #[error("Malformed response from {operation}: {reason}")]
    MalformedResponse { operation: String, reason: String },

    #[error("Failed to write {path}: {source}")]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing credential: {env_var} environment variable is not set")]
    MissingCredential { env_var: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl KinscopeError {
    /// Whether another attempt at the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            KinscopeError::ServiceUnavailable { .. } | KinscopeError::Timeout { .. } => true,
            KinscopeError::ServiceRejected { status, .. } => *status == 429 || *status >= 500,
            KinscopeError::ApiError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.as_u16() == 429 || s.is_server_error())
            }
            _ => false,
        }
    }

    /// The service refused the request itself (4xx other than 429), so
    /// repeating it unchanged cannot succeed.
    pub fn is_client_rejection(&self) -> bool {
        matches!(
            self,
            KinscopeError::ServiceRejected { status, .. } if (400..500).contains(status) && *status != 429
        )
    }

    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KinscopeError::OutputWriteFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, KinscopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let unavailable = KinscopeError::ServiceUnavailable {
            operation: "submit".into(),
            reason: "connection reset".into(),
        };
        assert!(unavailable.is_retryable());

        let throttled = KinscopeError::ServiceRejected {
            operation: "summarize".into(),
            status: 429,
            body: String::new(),
        };
        assert!(throttled.is_retryable());

        let bad_request = KinscopeError::ServiceRejected {
            operation: "summarize".into(),
            status: 400,
            body: "invalid video_id".into(),
        };
        assert!(!bad_request.is_retryable());

        let malformed = KinscopeError::MalformedResponse {
            operation: "poll".into(),
            reason: "missing status".into(),
        };
        assert!(!malformed.is_retryable());
    }

    #[test]
    fn client_rejection_excludes_throttling_and_server_errors() {
        let rejected = |status| KinscopeError::ServiceRejected {
            operation: "generate chapters".into(),
            status,
            body: String::new(),
        };
        assert!(rejected(404).is_client_rejection());
        assert!(rejected(400).is_client_rejection());
        assert!(!rejected(429).is_client_rejection());
        assert!(!rejected(503).is_client_rejection());
    }
}
