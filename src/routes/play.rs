use std::sync::Arc;

use axum::{
    extract::Path, http::StatusCode, response::IntoResponse, routing::get, Extension, Json,
    Router,
};
use serde_json::json;

use crate::resolver::{ResolveError, Resolver};

pub fn router() -> Router {
    Router::new()
        .route("/play/:video_id", get(play))
        .route("/api/yt/stream/:video_id", get(stream_compat))
        .route("/debug/:video_id", get(debug_video))
}

/* ---------------- play ---------------- */

async fn play(
    Path(video_id): Path<String>,
    Extension(resolver): Extension<Arc<Resolver>>,
) -> impl IntoResponse {
    match resolver.resolve(&video_id).await {
        Ok(info) => Json(info).into_response(),
        // this path never hard-fails: resolution errors go out as a
        // structured payload on a 200
        Err(e) => Json(e.body()).into_response(),
    }
}

/* ---------------- legacy frontend shape ---------------- */

async fn stream_compat(
    Path(video_id): Path<String>,
    Extension(resolver): Extension<Arc<Resolver>>,
) -> impl IntoResponse {
    match resolver.resolve(&video_id).await {
        Ok(info) => Json(json!({
            "url": info.stream_url,
            "title": info.title,
            "duration": info.duration,
            "video_id": video_id,
        }))
        .into_response(),
        Err(e) => {
            let code = match e {
                ResolveError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            let body = e.body();
            (code, Json(json!({ "error": body.error, "detail": body.detail }))).into_response()
        }
    }
}

/* ---------------- debug ---------------- */

async fn debug_video(
    Path(video_id): Path<String>,
    Extension(resolver): Extension<Arc<Resolver>>,
) -> impl IntoResponse {
    match resolver.inspect(&video_id).await {
        Ok(info) => {
            let formats: Vec<_> = info
                .formats
                .iter()
                .take(5)
                .map(|f| {
                    json!({
                        "format_id": f.format_id,
                        "ext": f.ext,
                        "acodec": f.acodec,
                        "vcodec": f.vcodec,
                        "url_available": f.url.is_some(),
                    })
                })
                .collect();
            Json(json!({
                "title": info.title,
                "duration": info.duration_string,
                "uploader": info.uploader,
                "formats_count": info.formats.len(),
                "available_formats": formats,
            }))
            .into_response()
        }
        Err(e) => Json(json!({ "error": e.body().detail })).into_response(),
    }
}
