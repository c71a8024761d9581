use axum::{
    extract::{Multipart, Path},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use bytes::Bytes;
use futures_util::stream::StreamExt;
use serde_json::{json, Value};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::info;

use crate::{
    error::{bad, io, AppErr, AppResult},
    state::{MediaEntry, MediaLog},
};

pub const UPLOAD_DIR: &str = "uploads";
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024; // 50MB
const ALLOWED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "m4a", "flac", "ogg"];

pub fn router() -> Router {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/library", get(library))
        .route("/songs/:filename", get(serve_song).delete(delete_song))
}

fn allowed_ext(name: &str) -> Option<String> {
    let ext = std::path::Path::new(name)
        .extension()?
        .to_str()?
        .to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// `/songs/:filename` must never escape the upload directory.
fn safe_path(filename: &str) -> AppResult<std::path::PathBuf> {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(bad("invalid filename"));
    }
    Ok(std::path::Path::new(UPLOAD_DIR).join(filename))
}

/* ---------------- upload ---------------- */

async fn upload_file(
    Extension(media): Extension<MediaLog>,
    mut mp: Multipart,
) -> AppResult<Json<Value>> {
    let Some(mut field) = mp.next_field().await.map_err(bad)? else {
        return Err(bad("no file"));
    };

    let original_name = field.file_name().unwrap_or("upload").to_string();
    let Some(ext) = allowed_ext(&original_name) else {
        return Err(AppErr::Bad(format!(
            "File type not supported. Allowed types: {}",
            ALLOWED_EXTENSIONS.map(|e| format!(".{e}")).join(", ")
        )));
    };

    fs::create_dir_all(UPLOAD_DIR).await.map_err(io)?;
    let filename = format!("{}.{ext}", uuid::Uuid::new_v4());
    let full = std::path::Path::new(UPLOAD_DIR).join(&filename);

    let mut file = File::create(&full).await.map_err(io)?;
    let mut size: u64 = 0;
    while let Some(chunk) = field.next().await {
        let chunk: Bytes = chunk.map_err(bad)?;
        size += chunk.len() as u64;
        if size > MAX_FILE_SIZE {
            drop(file);
            let _ = fs::remove_file(&full).await;
            return Err(AppErr::Bad(format!(
                "File too large. Maximum size: {}MB",
                MAX_FILE_SIZE / (1024 * 1024)
            )));
        }
        file.write_all(&chunk).await.map_err(io)?;
    }
    file.flush().await.map_err(io)?;

    media
        .write()
        .await
        .push_back(MediaEntry { path: full, size });
    info!(%filename, size, "file uploaded");

    Ok(Json(json!({
        "filename": filename,
        "original_name": original_name,
        "size": size,
        "message": "File uploaded successfully",
    })))
}

/* ---------------- library ---------------- */

async fn library() -> AppResult<Json<Value>> {
    let mut songs: Vec<Value> = Vec::new();

    if let Ok(mut dir) = fs::read_dir(UPLOAD_DIR).await {
        while let Some(entry) = dir.next_entry().await.map_err(io)? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if allowed_ext(&name).is_none() {
                continue;
            }
            let meta = entry.metadata().await.map_err(io)?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            songs.push(json!({
                "id": name,
                "filename": name,
                "original_name": path.file_stem().map(|s| s.to_string_lossy().to_string()),
                "size": meta.len(),
                "modified": modified,
                "url": format!("/songs/{name}"),
                "source": "local",
            }));
        }
    }

    // newest first
    songs.sort_by(|a, b| {
        let bm = b["modified"].as_f64().unwrap_or(0.0);
        let am = a["modified"].as_f64().unwrap_or(0.0);
        bm.total_cmp(&am)
    });

    Ok(Json(json!({ "total": songs.len(), "songs": songs })))
}

/* ---------------- serve / delete ---------------- */

async fn serve_song(Path(filename): Path<String>) -> AppResult<impl IntoResponse> {
    let path = safe_path(&filename)?;
    if fs::metadata(&path).await.is_err() {
        return Err(AppErr::NotFound("File not found".into()));
    }
    if allowed_ext(&filename).is_none() {
        return Err(bad("File type not supported"));
    }

    let body = fs::read(&path).await.map_err(io)?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        body,
    ))
}

async fn delete_song(
    Path(filename): Path<String>,
    Extension(media): Extension<MediaLog>,
) -> AppResult<Json<Value>> {
    let path = safe_path(&filename)?;
    match fs::remove_file(&path).await {
        Ok(()) => {
            media.write().await.retain(|m| m.path != path);
            info!(%filename, "file deleted");
            Ok(Json(json!({
                "message": format!("File {filename} deleted successfully"),
            })))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppErr::NotFound("File not found".into()))
        }
        Err(e) => Err(AppErr::Io(e)),
    }
}
