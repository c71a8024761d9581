use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{AppErr, AppResult},
    rooms::{RoomSnapshot, Rooms},
};

pub fn router() -> Router {
    Router::new()
        .route("/create-room", post(create_room))
        .route("/room/:room_id", get(room_info))
}

/* ---------------- create ---------------- */

async fn create_room(Extension(rooms): Extension<Rooms>) -> Json<Value> {
    let (room_id, snapshot) = rooms.create().await;
    info!(%room_id, "room created");
    Json(json!({
        "room_id": room_id,
        "host_id": snapshot.host_id,
        "message": "Room created successfully",
    }))
}

/* ---------------- lookup ---------------- */

async fn room_info(
    Path(room_id): Path<String>,
    Extension(rooms): Extension<Rooms>,
) -> AppResult<Json<RoomSnapshot>> {
    rooms
        .snapshot(&room_id)
        .await
        .map(Json)
        .ok_or_else(|| AppErr::NotFound("Room not found".into()))
}
