use std::{collections::VecDeque, path::PathBuf, sync::Arc};
use tokio::sync::RwLock;

/* ------------ 上傳媒體清單 -------------- */
#[derive(Clone)]
pub struct MediaEntry {
    pub path: PathBuf,
    pub size: u64,
}
pub type MediaLog = Arc<RwLock<VecDeque<MediaEntry>>>;

/* ------------ 外部協作程式旗標 ---------- */
/// Availability of the media collaborators, probed once at startup.
#[derive(Clone, Copy)]
pub struct Deps {
    pub youtube: bool,
    pub ytdlp: bool,
}
