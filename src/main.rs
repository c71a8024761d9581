use std::sync::Arc;

use listen_server::error::AppErr;
use listen_server::resolver::{self, Resolver, YtDlp};
use listen_server::rooms::Rooms;
use listen_server::state::{Deps, MediaLog};
use listen_server::utils::clean;

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    tokio::fs::create_dir_all("uploads").await?;
    tokio::fs::create_dir_all("static").await?;

    let ytdlp_ok = resolver::ytdlp::available().await;
    tracing::info!(available = ytdlp_ok, "yt-dlp probe");

    let deps = Deps { youtube: ytdlp_ok, ytdlp: ytdlp_ok };
    let rooms = Rooms::default();
    let resolver = Arc::new(Resolver::new(Box::new(YtDlp), ytdlp_ok));
    let media = MediaLog::default();

    tokio::spawn(clean::task(media.clone()));  // 啟動清道夫

    let app = listen_server::app(rooms, resolver, media, deps);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "listen_server up");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
