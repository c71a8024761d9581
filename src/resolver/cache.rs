use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::StreamInfo;

/// 快取有效時間：1 小時
fn max_age() -> Duration {
    Duration::hours(1)
}

/// Key = video id + wall-clock hour, so the same track resolved within the
/// hour hits cache and crossing the hour boundary forces re-resolution.
/// That boundary behavior is deliberate.
fn cache_key(video_id: &str, now: DateTime<Utc>) -> String {
    format!("{video_id}_{}", now.format("%Y%m%d%H"))
}

struct CacheEntry {
    info: StreamInfo,
    stored_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct StreamCache {
    inner: RwLock<HashMap<String, CacheEntry>>,
}

impl StreamCache {
    pub async fn lookup(&self, video_id: &str, now: DateTime<Utc>) -> Option<StreamInfo> {
        let map = self.inner.read().await;
        let entry = map.get(&cache_key(video_id, now))?;
        if now - entry.stored_at < max_age() {
            Some(entry.info.clone())
        } else {
            None
        }
    }

    /// Insert under the current hour bucket, then scan-purge every entry that
    /// has outlived the validity window.
    pub async fn store(&self, video_id: &str, info: StreamInfo, now: DateTime<Utc>) {
        let mut map = self.inner.write().await;
        map.insert(cache_key(video_id, now), CacheEntry { info, stored_at: now });
        let before = map.len();
        map.retain(|_, e| now - e.stored_at <= max_age());
        if map.len() < before {
            debug!(purged = before - map.len(), "purged expired stream cache entries");
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
