use crate::config::Config;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response, StatusCode, header};
use axum::middleware::Next;
use axum::response::IntoResponse;
use serde_json::Value as JsonValue;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const PREVIEW_CHARS: usize = 2 * 1024;

/// Keep guards alive for the lifetime of the app.
pub struct LogGuards {
    _file_guard: Option<WorkerGuard>,
}

fn split_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("dishlens.logs"))
        .to_string_lossy()
        .to_string();
    (dir, file)
}

pub fn init_logging(config: &Config) -> LogGuards {
    let filter = EnvFilter::new(config.log_filter());

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .compact()
        .with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()));

    let (dir, file) = split_path(&config.log_file);
    let appender = tracing_appender::rolling::never(dir, file);
    let (nb, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_writer(nb);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    LogGuards {
        _file_guard: Some(guard),
    }
}

/// Debug-level previews of JSON request/response bodies, correlated by
/// request id. Base64 photos are replaced by their length. `limit` is the
/// app's body limit; a request body over it is answered with 413.
pub async fn log_payloads(
    State(limit): State<usize>,
    req: Request<Body>,
    next: Next,
) -> Response<Body> {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return next.run(req).await;
    }

    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let (req_parts, req_body) = req.into_parts();
    let req = match axum::body::to_bytes(req_body, limit).await {
        Ok(bytes) => {
            tracing::debug!(request_id=%req_id, request_body=%preview(&bytes), "request body");
            Request::from_parts(req_parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::warn!(request_id=%req_id, error=%e, "failed reading request body");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Failed to buffer the request body: {e}"),
            )
                .into_response();
        }
    };

    let res: Response<Body> = next.run(req).await;

    let is_json = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return res;
    }

    let (res_parts, res_body) = res.into_parts();
    match axum::body::to_bytes(res_body, usize::MAX).await {
        Ok(bytes) => {
            tracing::debug!(request_id=%req_id, response_body=%preview(&bytes), "response body");
            Response::from_parts(res_parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::warn!(request_id=%req_id, error=%e, "failed reading response body");
            Response::from_parts(res_parts, Body::empty())
        }
    }
}

/// Truncated, log-safe rendering of a body.
#[must_use]
pub fn preview(bytes: &[u8]) -> String {
    let text = match serde_json::from_slice::<JsonValue>(bytes) {
        Ok(mut v) => {
            if let Some(img) = v.get_mut("image")
                && let Some(len) = img.as_str().map(str::len)
            {
                *img = JsonValue::String(format!("<{len} base64 chars>"));
            }
            v.to_string()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    };

    if text.chars().count() > PREVIEW_CHARS {
        format!(
            "{}… [truncated]",
            text.chars().take(PREVIEW_CHARS).collect::<String>()
        )
    } else {
        text
    }
}
