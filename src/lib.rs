pub mod error;
pub mod fanout;
pub mod resolver;
pub mod rooms;
pub mod routes;
pub mod state;
pub mod utils {
    pub mod clean;
}

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Extension, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
};

use crate::resolver::Resolver;
use crate::rooms::Rooms;
use crate::state::{Deps, MediaLog};

pub const BODY_LIMIT: usize = 100 * 1024 * 1024;

/// Full application router; `main` and the integration tests share it.
pub fn app(rooms: Rooms, resolver: Arc<Resolver>, media: MediaLog, deps: Deps) -> Router {
    routes::router()
        .nest_service("/static", ServeDir::new("static"))
        .fallback(routes::status::not_found)
        .layer(Extension(rooms))
        .layer(Extension(resolver))
        .layer(Extension(media))
        .layer(Extension(deps))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
}
