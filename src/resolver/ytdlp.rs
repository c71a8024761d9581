//! Glue around the `yt-dlp` binary: stream extraction and catalog search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

const BIN: &str = "yt-dlp";

/// 偽裝桌面瀏覽器，避免被封鎖
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/* ---------------- extraction ---------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub duration_string: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatCandidate {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("yt-dlp not available")]
    Unavailable,

    /// The binary ran and refused; the message is its stderr.
    #[error("{0}")]
    Download(String),

    #[error("no video info")]
    NoInfo,

    #[error("yt-dlp failed to run: {0}")]
    Io(String),
}

/// Seam for the media-extraction collaborator.
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self, watch_url: &str) -> Result<VideoInfo, ExtractError>;
}

pub struct YtDlp;

#[async_trait]
impl Extract for YtDlp {
    async fn extract(&self, watch_url: &str) -> Result<VideoInfo, ExtractError> {
        let out = Command::new(BIN)
            .args([
                "-J",
                "--no-playlist",
                "--no-warnings",
                "--no-check-certificates",
                "--age-limit",
                "18",
                "-f",
                "bestaudio[ext=m4a]/bestaudio/best",
                "--user-agent",
                USER_AGENT,
                watch_url,
            ])
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExtractError::Unavailable,
                _ => ExtractError::Io(e.to_string()),
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(ExtractError::Download(stderr));
        }
        serde_json::from_slice(&out.stdout).map_err(|_| ExtractError::NoInfo)
    }
}

/// Startup probe; the status endpoints report this flag.
pub async fn available() -> bool {
    Command::new(BIN)
        .arg("--version")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/* ---------------- search ---------------- */

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub duration: String,
    pub thumbnail: String,
    pub url: String,
}

#[derive(Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

#[derive(Deserialize)]
struct FlatEntry {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

pub async fn search(query: &str, limit: usize) -> Result<Vec<SearchResult>, ExtractError> {
    let out = Command::new(BIN)
        .args([
            "-J",
            "--flat-playlist",
            "--no-warnings",
            &format!("ytsearch{limit}:{query}"),
        ])
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractError::Unavailable,
            _ => ExtractError::Io(e.to_string()),
        })?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        return Err(ExtractError::Download(stderr));
    }

    let playlist: FlatPlaylist =
        serde_json::from_slice(&out.stdout).map_err(|_| ExtractError::NoInfo)?;

    let mut results = Vec::new();
    for entry in playlist.entries {
        let (Some(id), Some(title)) = (entry.id, entry.title) else {
            warn!("skipping search entry with missing fields");
            continue;
        };
        // no shorts, no duration-less livestreams
        let Some(duration) = entry.duration.filter(|d| *d > 0.0) else { continue };
        if title.contains("Shorts") {
            continue;
        }
        let url = entry
            .url
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={id}"));
        results.push(SearchResult {
            channel: entry.channel.or(entry.uploader).unwrap_or_default(),
            duration: fmt_duration(duration),
            thumbnail: entry
                .thumbnails
                .first()
                .and_then(|t| t.url.clone())
                .unwrap_or_default(),
            id,
            title,
            url,
        });
    }
    info!(total = results.len(), "search produced valid results");
    Ok(results)
}

fn fmt_duration(secs: f64) -> String {
    let s = secs.round() as u64;
    let (h, m, sec) = (s / 3600, (s % 3600) / 60, s % 60);
    if h > 0 {
        format!("{h}:{m:02}:{sec:02}")
    } else {
        format!("{m}:{sec:02}")
    }
}
