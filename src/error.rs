use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    /// Client input problem -> 400 with `{ error }`.
    BadRequest(String),
    /// A fatal upstream failure -> 500 with `{ error, details }`.
    Upstream {
        error: String,
        details: Option<String>,
    },
    /// Internal error -> 500 with JSON body; logged.
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn upstream(error: impl Into<String>, cause: &UpstreamError) -> Self {
        Self::Upstream {
            error: error.into(),
            details: Some(cause.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Anyhow(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Anyhow(e.into())
    }
}

/// Failure of an external collaborator (asset host or inference provider).
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Unavailable(format!("timed out: {e}"))
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}

impl From<std::io::Error> for UpstreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Unavailable(format!("staging file: {e}"))
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::BadRequest(msg) => {
                tracing::info!(error = %msg, "rejected request");
                let body = Json(ErrBody {
                    error: msg,
                    details: None,
                });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            Self::Upstream { error, details } => {
                tracing::error!(error = %error, details = ?details, "upstream failure");
                let body = Json(ErrBody { error, details });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            Self::Anyhow(err) => {
                tracing::error!("{:#}", err);
                let body = Json(ErrBody {
                    error: err.to_string(),
                    details: None,
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
