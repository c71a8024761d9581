use axum::{http::StatusCode, response::IntoResponse, routing::get, Extension, Json, Router};
use serde::Serialize;
use serde_json::json;

use crate::state::Deps;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    message: &'static str,
    youtube_available: bool,
    ytdlp_available: bool,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/status", get(api_status))
}

async fn root(Extension(deps): Extension<Deps>) -> Json<Health> {
    Json(Health {
        status: "success",
        message: "Listen server API is running!",
        youtube_available: deps.youtube,
        ytdlp_available: deps.ytdlp,
    })
}

async fn health(Extension(deps): Extension<Deps>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        message: "API is operational",
        youtube_available: deps.youtube,
        ytdlp_available: deps.ytdlp,
    })
}

async fn api_status(Extension(deps): Extension<Deps>) -> Json<Health> {
    Json(Health {
        status: "success",
        message: "Listen server API is running!",
        youtube_available: deps.youtube,
        ytdlp_available: deps.ytdlp,
    })
}

/// JSON 404 for everything that matches no route.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "detail": "The requested resource was not found",
        })),
    )
}
