use tokio::{fs, time};
use tracing::info;

use crate::state::MediaLog;

pub const DISK_CAP: u64 = 10 * 1024 * 1024 * 1024; // 10 GB

/// Keep the upload store under the disk cap, oldest files first.
pub async fn task(log: MediaLog) {
    let mut tick = time::interval(time::Duration::from_secs(30));
    loop {
        tick.tick().await;
        let used: u64 = log.read().await.iter().map(|m| m.size).sum();
        if used <= DISK_CAP {
            continue;
        }

        let mut lg = log.write().await;
        let mut space = used;
        while space > DISK_CAP {
            let Some(old) = lg.pop_front() else { break };
            if fs::remove_file(&old.path).await.is_ok() {
                info!(path = %old.path.display(), size = old.size, "evicted upload");
                space -= old.size;
            }
        }
    }
}
