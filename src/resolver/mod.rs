//! Track id → playable stream descriptor, with typed failures.
//!
//! Every expected failure mode comes back as a [`ResolveError`] carrying a
//! user-facing payload; nothing on this path is ever surfaced as a transport
//! fault.

pub mod cache;
pub mod ytdlp;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

pub use cache::StreamCache;
pub use ytdlp::{Extract, ExtractError, FormatCandidate, SearchResult, VideoInfo, YtDlp};

/// Resolved playable stream + metadata.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub stream_url: String,
    pub title: String,
    pub duration: String,
}

/// Structured error payload handed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ResolveError {
    /// The extraction collaborator is not installed.
    Unavailable,
    Forbidden,
    VideoNotFound,
    Extraction(String),
    NoVideoInfo,
    NoAudioStream,
    Internal(String),
}

impl ResolveError {
    pub fn body(&self) -> ErrorBody {
        let (error, detail, suggestions) = match self {
            Self::Unavailable => (
                "Service Unavailable",
                "yt-dlp not available. Please install yt-dlp".to_string(),
                vec![
                    "Install yt-dlp and make sure it is on PATH",
                    "Try uploading local files instead",
                ],
            ),
            Self::Forbidden => (
                "Access Forbidden",
                "This video is currently blocked by YouTube".to_string(),
                vec![
                    "Try a different video",
                    "This is a temporary YouTube restriction",
                    "The video may be geo-blocked",
                ],
            ),
            Self::VideoNotFound => (
                "Video Not Found",
                "This video is not available".to_string(),
                vec![
                    "The video may have been deleted",
                    "Check if the video ID is correct",
                    "Try searching for the song again",
                ],
            ),
            Self::Extraction(msg) => (
                "Extraction Failed",
                format!("Could not extract video: {}", truncate(msg, 100)),
                vec![
                    "Try a different video",
                    "Check your internet connection",
                    "YouTube may be blocking requests",
                ],
            ),
            Self::NoVideoInfo => (
                "No Video Info",
                "Could not retrieve video information".to_string(),
                vec!["Try a different video", "The video may be private"],
            ),
            Self::NoAudioStream => (
                "No Audio Stream",
                "No playable audio stream found for this video".to_string(),
                vec![
                    "This video may not have audio",
                    "Try a different video",
                    "The video format may not be supported",
                ],
            ),
            Self::Internal(msg) => (
                "Internal Error",
                format!("An unexpected error occurred: {}", truncate(msg, 100)),
                vec![
                    "Try again in a few moments",
                    "Check your internet connection",
                    "Try a different video",
                ],
            ),
        };
        ErrorBody {
            error: error.to_string(),
            detail,
            suggestions: suggestions.into_iter().map(String::from).collect(),
        }
    }
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn classify_download_error(msg: &str) -> ResolveError {
    let lower = msg.to_lowercase();
    if lower.contains("403") || lower.contains("forbidden") {
        ResolveError::Forbidden
    } else if lower.contains("404") || lower.contains("not found") {
        ResolveError::VideoNotFound
    } else {
        ResolveError::Extraction(msg.to_string())
    }
}

/// Audio format priority. Audio-only candidates win within each step; a
/// candidate with a missing `acodec` counts as audio-bearing.
const FORMAT_PRIORITIES: [&str; 4] = ["m4a", "mp3", "webm", "mp4"];

fn select_audio_url(formats: &[FormatCandidate]) -> Option<String> {
    for want in FORMAT_PRIORITIES {
        let only_audio = formats.iter().find(|f| {
            f.acodec.as_deref() != Some("none")
                && f.vcodec.as_deref() == Some("none")
                && f.ext.as_deref() == Some(want)
        });
        if let Some(url) = only_audio.and_then(|f| f.url.clone()) {
            info!("found {want} audio-only stream");
            return Some(url);
        }
    }
    // no audio-only candidate: first format that carries audio at all
    let mixed = formats.iter().find(|f| f.acodec.as_deref() != Some("none"))?;
    if let Some(url) = mixed.url.clone() {
        info!("using mixed format: {}", mixed.ext.as_deref().unwrap_or("unknown"));
        return Some(url);
    }
    None
}

/* ---------------- resolver ---------------- */

pub struct Resolver {
    extractor: Box<dyn Extract>,
    cache: StreamCache,
    http: reqwest::Client,
    available: bool,
}

impl Resolver {
    pub fn new(extractor: Box<dyn Extract>, available: bool) -> Self {
        Self {
            extractor,
            cache: StreamCache::default(),
            http: reqwest::Client::new(),
            available,
        }
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub async fn resolve(&self, video_id: &str) -> Result<StreamInfo, ResolveError> {
        self.resolve_at(video_id, Utc::now()).await
    }

    async fn resolve_at(
        &self,
        video_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StreamInfo, ResolveError> {
        if !self.available {
            return Err(ResolveError::Unavailable);
        }

        if let Some(hit) = self.cache.lookup(video_id, now).await {
            info!(%video_id, "returning cached stream URL");
            return Ok(hit);
        }

        info!(%video_id, "extracting stream URL");
        let info = self.extract_info(video_id).await?;

        let stream_url = select_audio_url(&info.formats).ok_or(ResolveError::NoAudioStream)?;
        self.probe(&stream_url).await;

        let resolved = StreamInfo {
            stream_url,
            title: info.title.unwrap_or_else(|| "Unknown Title".into()),
            duration: info.duration_string.unwrap_or_else(|| "Unknown".into()),
        };
        self.cache.store(video_id, resolved.clone(), now).await;
        info!(%video_id, "successfully extracted stream URL");
        Ok(resolved)
    }

    /// Raw extraction, bypassing cache and selection. Diagnostics only.
    pub async fn inspect(&self, video_id: &str) -> Result<VideoInfo, ResolveError> {
        if !self.available {
            return Err(ResolveError::Unavailable);
        }
        self.extract_info(video_id).await
    }

    async fn extract_info(&self, video_id: &str) -> Result<VideoInfo, ResolveError> {
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        match self.extractor.extract(&watch_url).await {
            Ok(info) => Ok(info),
            Err(ExtractError::Unavailable) => Err(ResolveError::Unavailable),
            Err(ExtractError::NoInfo) => Err(ResolveError::NoVideoInfo),
            Err(ExtractError::Io(msg)) => Err(ResolveError::Internal(msg)),
            Err(ExtractError::Download(msg)) => {
                warn!(%video_id, "extraction error: {msg}");
                Err(classify_download_error(&msg))
            }
        }
    }

    /// Best-effort liveness check. Failures are logged, never fatal.
    async fn probe(&self, url: &str) {
        let head = self
            .http
            .head(url)
            .timeout(std::time::Duration::from_secs(5))
            .header(reqwest::header::USER_AGENT, ytdlp::USER_AGENT)
            .send()
            .await;
        match head {
            Ok(resp) if resp.status().as_u16() >= 400 => {
                warn!("stream URL returned status {}", resp.status());
            }
            Ok(_) => {}
            Err(e) => warn!("could not verify stream URL: {e}"),
        }
    }
}
