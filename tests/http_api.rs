use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use listen_server::resolver::{Extract, ExtractError, FormatCandidate, Resolver, VideoInfo};
use listen_server::rooms::Rooms;
use listen_server::state::{Deps, MediaLog};

struct NoExtractor;

#[async_trait]
impl Extract for NoExtractor {
    async fn extract(&self, _watch_url: &str) -> Result<VideoInfo, ExtractError> {
        Err(ExtractError::Unavailable)
    }
}

struct Fixed(VideoInfo);

#[async_trait]
impl Extract for Fixed {
    async fn extract(&self, _watch_url: &str) -> Result<VideoInfo, ExtractError> {
        Ok(self.0.clone())
    }
}

fn bare_app() -> (Router, Rooms) {
    let rooms = Rooms::default();
    let resolver = Arc::new(Resolver::new(Box::new(NoExtractor), false));
    let deps = Deps { youtube: false, ytdlp: false };
    let app = listen_server::app(rooms.clone(), resolver, MediaLog::default(), deps);
    (app, rooms)
}

fn app_with_extractor(info: VideoInfo) -> Router {
    let resolver = Arc::new(Resolver::new(Box::new(Fixed(info)), true));
    let deps = Deps { youtube: true, ytdlp: true };
    listen_server::app(Rooms::default(), resolver, MediaLog::default(), deps)
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_reports_collaborator_flags() {
    let (app, _) = bare_app();
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["ytdlp_available"], false);
    assert_eq!(json["youtube_available"], false);
}

#[tokio::test]
async fn create_room_then_fetch_snapshot() {
    let (app, _) = bare_app();

    let resp = app.clone().oneshot(post("/create-room")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    let room_id = created["room_id"].as_str().unwrap().to_string();
    assert_eq!(created["host_id"], format!("host_{room_id}"));
    assert_eq!(created["message"], "Room created successfully");

    let resp = app.oneshot(get(&format!("/room/{room_id}"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let room = body_json(resp).await;
    assert_eq!(room["host_id"], format!("host_{room_id}"));
    assert_eq!(room["is_playing"], false);
    assert_eq!(room["current_time"], 0.0);
    assert_eq!(room["listener_count"], 0);
    assert!(room["current_song"].is_null());
}

#[tokio::test]
async fn unknown_room_is_404() {
    let (app, _) = bare_app();
    let resp = app.oneshot(get("/room/does-not-exist")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "Not found");
}

#[tokio::test]
async fn unmatched_route_is_json_404() {
    let (app, _) = bare_app();
    let resp = app.oneshot(get("/definitely/not/here")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "Not found");
    assert_eq!(json["detail"], "The requested resource was not found");
}

#[tokio::test]
async fn play_without_collaborator_is_structured_200() {
    let (app, _) = bare_app();
    let resp = app.oneshot(get("/play/abc123")).await.unwrap();
    // resolution failures never hard-fail this path
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "Service Unavailable");
    assert!(json["suggestions"].as_array().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn compat_route_maps_failure_to_400() {
    let (app, _) = bare_app();
    let resp = app.oneshot(get("/api/yt/stream/abc123")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "Service Unavailable");
    assert!(json["suggestions"].is_null());
}

#[tokio::test]
async fn play_resolves_with_priority_selection() {
    let info = VideoInfo {
        title: Some("Test Track".into()),
        duration_string: Some("3:05".into()),
        uploader: None,
        formats: vec![
            FormatCandidate {
                format_id: None,
                ext: Some("webm".into()),
                acodec: Some("opus".into()),
                vcodec: Some("none".into()),
                url: Some("http://127.0.0.1:9/a.webm".into()),
            },
            FormatCandidate {
                format_id: None,
                ext: Some("m4a".into()),
                acodec: Some("aac".into()),
                vcodec: Some("none".into()),
                url: Some("http://127.0.0.1:9/a.m4a".into()),
            },
        ],
    };
    let app = app_with_extractor(info);

    let resp = app.oneshot(get("/play/abc123")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["stream_url"], "http://127.0.0.1:9/a.m4a");
    assert_eq!(json["title"], "Test Track");
    assert_eq!(json["duration"], "3:05");
}

#[tokio::test]
async fn search_without_collaborator_is_503() {
    let (app, _) = bare_app();
    let resp = app.oneshot(get("/search?q=test")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn search_with_blank_query_is_400() {
    let info = VideoInfo {
        title: None,
        duration_string: None,
        uploader: None,
        formats: vec![],
    };
    let app = app_with_extractor(info);
    let resp = app.oneshot(get("/search?q=%20")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_rejects_unsupported_extension() {
    let (app, _) = bare_app();
    let boundary = "xyzboundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"track.exe\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         not audio\r\n\
         --{boundary}--\r\n"
    );
    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
