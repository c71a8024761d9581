use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path,
    },
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    fanout::PEER_BUFFER,
    rooms::{HostUpdate, LeaveOutcome, Rooms},
};

pub fn router() -> Router {
    Router::new().route("/ws/:room_id/:user_id", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((room_id, user_id)): Path<(String, String)>,
    Extension(rooms): Extension<Rooms>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(socket, room_id, user_id, rooms))
}

/* ---------------- per connection ---------------- */

async fn session(socket: WebSocket, room_id: String, user_id: String, rooms: Rooms) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(PEER_BUFFER);

    // unknown room id ⇒ created on the spot, this user is host
    let joined = rooms.join(&room_id, &user_id, tx.clone()).await;
    let conn_id = joined.conn_id;
    info!(%room_id, %user_id, is_host = joined.is_host, "connection joined");

    // everything addressed to this peer funnels through one outbound pump
    let pump = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // the fresh member gets the full state privately...
    let hello = json!({
        "type": "room_state",
        "data": &joined.snapshot,
        "is_host": joined.is_host,
    });
    let _ = tx.try_send(hello.to_string());

    // ...everyone else hears about the join
    let joined_evt = json!({
        "type": "user_joined",
        "user_id": &user_id,
        "listener_count": joined.snapshot.listener_count,
    });
    rooms
        .broadcast(&room_id, &joined_evt.to_string(), Some(conn_id))
        .await;

    while let Some(Ok(frame)) = stream.next().await {
        let raw = match frame {
            Message::Text(raw) => raw,
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(msg) = serde_json::from_str::<Value>(&raw) else {
            debug!(%room_id, %user_id, "ignoring malformed message");
            continue;
        };
        let Some(kind) = msg.get("type").and_then(Value::as_str).map(str::to_owned) else {
            continue;
        };

        let update = HostUpdate::from_msg(&msg);
        match rooms.apply_host_update(&room_id, &user_id, update.as_ref()).await {
            // host: run the transition (when the kind names one) and echo it,
            // updated room state attached, to everyone else
            Some(snapshot) => {
                let echo = json!({
                    "type": &kind,
                    "data": &msg,
                    "room_state": &snapshot,
                });
                rooms
                    .broadcast(&room_id, &echo.to_string(), Some(conn_id))
                    .await;
            }
            // listener: may only ask for a private resync
            None => {
                if kind == "sync_request" {
                    if let Some(snapshot) = rooms.snapshot(&room_id).await {
                        let reply = json!({ "type": "sync_response", "data": &snapshot });
                        let _ = tx.try_send(reply.to_string());
                    }
                } else {
                    debug!(%room_id, %user_id, %kind, "dropping listener control message");
                }
            }
        }
    }

    info!(%room_id, %user_id, "connection closed");
    match rooms.leave(&room_id, conn_id).await {
        LeaveOutcome::Remaining(snapshot) => {
            let left = json!({
                "type": "user_left",
                "user_id": &user_id,
                "listener_count": snapshot.listener_count,
            });
            rooms.broadcast(&room_id, &left.to_string(), None).await;
        }
        LeaveOutcome::Destroyed => info!(%room_id, "last listener left, room destroyed"),
        LeaveOutcome::UnknownRoom => {}
    }
    pump.abort();
}
