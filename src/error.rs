use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::fmt::Display;

pub type AppResult<T> = Result<T, AppErr>;

#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Bad request: {0}")]
    Bad(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        let (code, error, detail) = match self {
            AppErr::Bad(msg)      => (StatusCode::BAD_REQUEST, "Bad request", msg),
            AppErr::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg),
            AppErr::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", msg),
            other => {
                tracing::error!("internal error: {other}");
                (StatusCode::INTERNAL_SERVER_ERROR,
                 "Internal server error",
                 "An unexpected error occurred".to_string())
            }
        };
        (code, Json(json!({ "error": error, "detail": detail }))).into_response()
    }
}

/* ── 小助手：把任何 error 轉成 Bad / Io ── */
pub fn bad<E: Display>(e: E) -> AppErr { AppErr::Bad(e.to_string()) }

pub fn io<E: Into<std::io::Error>>(e: E) -> AppErr {
    AppErr::Io(e.into())
}
