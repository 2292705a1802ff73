use reqwest::StatusCode;
use thiserror::Error;

/// Failure classes the backup cycle branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying on a later cycle: API refusals, server trouble,
    /// network trouble.
    Transient,
    /// The referenced remote path does not exist.
    NotFound,
    /// Everything else; callers are expected to propagate these.
    Unexpected,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("dropbox {op} refused: {summary}")]
    Api { op: &'static str, summary: String },

    #[error("dropbox server error ({status}) during {op}")]
    Server { op: &'static str, status: StatusCode },

    #[error("dropbox rate limit hit during {op}")]
    RateLimited { op: &'static str },

    #[error("remote path not found: {path}")]
    NotFound { path: String },

    #[error("dropbox authorization failed ({status}): {body}")]
    Auth { status: StatusCode, body: String },

    #[error("unexpected dropbox response ({status}) during {op}: {body}")]
    Unexpected {
        op: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::Network(err) => {
                if err.is_timeout() || err.is_connect() || err.is_request() {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Unexpected
                }
            }
            StorageError::Api { .. }
            | StorageError::Server { .. }
            | StorageError::RateLimited { .. } => ErrorClass::Transient,
            StorageError::NotFound { .. } => ErrorClass::NotFound,
            StorageError::Auth { .. }
            | StorageError::Unexpected { .. }
            | StorageError::Url(_)
            | StorageError::Json(_)
            | StorageError::Io(_) => ErrorClass::Unexpected,
        }
    }
}

/// Maps a non-success Dropbox response to an error.
///
/// 409 responses carry a machine-readable `error_summary`; `not_found`
/// anywhere in it means the referenced path does not exist, every other
/// summary is an API refusal worth retrying on a later cycle.
pub(crate) fn classify_response(
    op: &'static str,
    path: &str,
    status: StatusCode,
    body: &str,
) -> StorageError {
    if status == StatusCode::CONFLICT {
        let summary = error_summary(body);
        if summary.contains("not_found") {
            return StorageError::NotFound {
                path: path.to_string(),
            };
        }
        return StorageError::Api { op, summary };
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return StorageError::RateLimited { op };
    }
    if status.is_server_error() {
        return StorageError::Server { op, status };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return StorageError::Auth {
            status,
            body: body.to_string(),
        };
    }
    StorageError::Unexpected {
        op,
        status,
        body: body.to_string(),
    }
}

fn error_summary(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error_summary: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error_summary)
        .unwrap_or_else(|_| body.to_string())
}
