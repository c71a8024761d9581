use axum::Router;

pub mod play;
pub mod rooms;
pub mod search;
pub mod status;
pub mod upload;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .merge(status::router())
        .merge(rooms::router())
        .merge(ws::router())
        .merge(search::router())
        .merge(play::router())
        .merge(upload::router())
}
