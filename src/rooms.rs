use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::fanout::{ConnId, Peers, PeerTx};

/* ------------ 播放狀態 ------------ */

pub struct Room {
    pub host_id: String,
    pub current_song: Option<Value>,
    pub is_playing: bool,
    pub current_time: f64,
    pub last_update: DateTime<Utc>,
}

impl Room {
    fn new(host_id: String) -> Self {
        Self {
            host_id,
            current_song: None,
            is_playing: false,
            current_time: 0.0,
            last_update: Utc::now(),
        }
    }

    fn apply(&mut self, update: &HostUpdate) {
        match update {
            HostUpdate::Play { position } => {
                self.is_playing = true;
                self.current_time = position.max(0.0);
            }
            HostUpdate::Pause { position } => {
                self.is_playing = false;
                self.current_time = position.max(0.0);
            }
            HostUpdate::Seek { position } => {
                self.current_time = position.max(0.0);
            }
            HostUpdate::SongChange { song } => {
                self.current_song = song.clone();
                self.current_time = 0.0;
                self.is_playing = false;
            }
        }
        self.last_update = Utc::now();
    }
}

/// What goes over the wire as `room_state` and out of `GET /room/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub host_id: String,
    pub current_song: Option<Value>,
    pub is_playing: bool,
    pub current_time: f64,
    pub last_update: DateTime<Utc>,
    pub listener_count: usize,
}

/* ------------ 主持人指令 ------------ */

#[derive(Debug, Clone)]
pub enum HostUpdate {
    Play { position: f64 },
    Pause { position: f64 },
    Seek { position: f64 },
    SongChange { song: Option<Value> },
}

impl HostUpdate {
    /// Map a raw client message onto a state transition, if it names one.
    pub fn from_msg(msg: &Value) -> Option<Self> {
        let position = msg.get("current_time").and_then(Value::as_f64).unwrap_or(0.0);
        match msg.get("type").and_then(Value::as_str)? {
            "play"  => Some(Self::Play { position }),
            "pause" => Some(Self::Pause { position }),
            "seek"  => Some(Self::Seek { position }),
            "song_change" => Some(Self::SongChange {
                song: msg.get("song").filter(|s| !s.is_null()).cloned(),
            }),
            _ => None,
        }
    }
}

struct RoomState {
    room: Room,
    peers: Peers,
}

impl RoomState {
    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            host_id: self.room.host_id.clone(),
            current_song: self.room.current_song.clone(),
            is_playing: self.room.is_playing,
            current_time: self.room.current_time,
            last_update: self.room.last_update,
            listener_count: self.peers.len(),
        }
    }
}

pub struct Joined {
    pub conn_id: ConnId,
    pub snapshot: RoomSnapshot,
    pub is_host: bool,
}

pub enum LeaveOutcome {
    /// Room still has members; snapshot taken after the departure.
    Remaining(RoomSnapshot),
    /// Last member left, room torn down.
    Destroyed,
    UnknownRoom,
}

/* ------------ 活動房間註冊表 ------------ */

/// Registry of live rooms. One write lock covers both the playback state and
/// the peer set of a room, so every transition is atomic with respect to the
/// other sessions touching it.
#[derive(Clone, Default)]
pub struct Rooms {
    inner: Arc<RwLock<HashMap<String, RoomState>>>,
    next_conn: Arc<AtomicU64>,
}

impl Rooms {
    /// Explicit room creation. No connection exists yet, so the host id is
    /// synthesized from the room id.
    pub async fn create(&self) -> (String, RoomSnapshot) {
        let room_id = nanoid::nanoid!(12);
        let host_id = format!("host_{room_id}");
        let state = RoomState {
            room: Room::new(host_id),
            peers: Peers::default(),
        };
        let snapshot = state.snapshot();
        self.inner.write().await.insert(room_id.clone(), state);
        (room_id, snapshot)
    }

    pub async fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.inner.read().await.get(room_id).map(RoomState::snapshot)
    }

    /// Attach a connection. An unknown room id is created on the spot and the
    /// joining user becomes its host.
    pub async fn join(&self, room_id: &str, user_id: &str, tx: PeerTx) -> Joined {
        let conn_id = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let mut map = self.inner.write().await;
        let state = map.entry(room_id.to_string()).or_insert_with(|| RoomState {
            room: Room::new(user_id.to_string()),
            peers: Peers::default(),
        });
        state.peers.register(conn_id, user_id, tx);
        Joined {
            conn_id,
            is_host: state.room.host_id == user_id,
            snapshot: state.snapshot(),
        }
    }

    /// Run one host-originated transition. Returns the post-update snapshot,
    /// or `None` when the sender is not the room's host (no mutation happens
    /// in that case). `update` may be empty for message kinds that are
    /// relayed without touching state.
    pub async fn apply_host_update(
        &self,
        room_id: &str,
        user_id: &str,
        update: Option<&HostUpdate>,
    ) -> Option<RoomSnapshot> {
        let mut map = self.inner.write().await;
        let state = map.get_mut(room_id)?;
        if state.room.host_id != user_id {
            return None;
        }
        if let Some(update) = update {
            state.room.apply(update);
        }
        Some(state.snapshot())
    }

    /// Best-effort fan-out; dead peers are swept as part of the call.
    pub async fn broadcast(&self, room_id: &str, payload: &str, exclude: Option<ConnId>) -> usize {
        let mut map = self.inner.write().await;
        match map.get_mut(room_id) {
            Some(state) => state.peers.broadcast(payload, exclude),
            None => 0,
        }
    }

    /// Detach a connection, destroying the room once its last member is gone.
    pub async fn leave(&self, room_id: &str, conn_id: ConnId) -> LeaveOutcome {
        let mut map = self.inner.write().await;
        let Some(state) = map.get_mut(room_id) else {
            return LeaveOutcome::UnknownRoom;
        };
        state.peers.unregister(conn_id);
        if state.peers.is_empty() {
            map.remove(room_id);
            LeaveOutcome::Destroyed
        } else {
            LeaveOutcome::Remaining(state.snapshot())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::PEER_BUFFER;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn tx() -> (PeerTx, mpsc::Receiver<String>) {
        mpsc::channel(PEER_BUFFER)
    }

    #[tokio::test]
    async fn create_starts_idle_with_synthetic_host() {
        let rooms = Rooms::default();
        let (id, snap) = rooms.create().await;
        assert_eq!(snap.host_id, format!("host_{id}"));
        assert!(snap.current_song.is_none());
        assert!(!snap.is_playing);
        assert_eq!(snap.current_time, 0.0);
        assert_eq!(snap.listener_count, 0);
    }

    #[tokio::test]
    async fn room_ids_are_unique() {
        let rooms = Rooms::default();
        let (a, _) = rooms.create().await;
        let (b, _) = rooms.create().await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn first_connector_becomes_host() {
        let rooms = Rooms::default();
        let (t1, _r1) = tx();
        let joined = rooms.join("r", "alice", t1).await;
        assert!(joined.is_host);
        assert_eq!(joined.snapshot.host_id, "alice");
        assert_eq!(joined.snapshot.listener_count, 1);

        let (t2, _r2) = tx();
        let joined = rooms.join("r", "bob", t2).await;
        assert!(!joined.is_host);
        assert_eq!(joined.snapshot.host_id, "alice");
        assert_eq!(joined.snapshot.listener_count, 2);
    }

    #[tokio::test]
    async fn host_identity_survives_host_socket_leaving() {
        let rooms = Rooms::default();
        let (t1, _r1) = tx();
        let (t2, _r2) = tx();
        let host = rooms.join("r", "alice", t1).await;
        rooms.join("r", "bob", t2).await;

        rooms.leave("r", host.conn_id).await;
        let snap = rooms.snapshot("r").await.unwrap();
        assert_eq!(snap.host_id, "alice");
        assert_eq!(snap.listener_count, 1);
    }

    #[tokio::test]
    async fn play_pause_seek_transitions() {
        let rooms = Rooms::default();
        let (t, _r) = tx();
        rooms.join("r", "alice", t).await;

        let up = HostUpdate::from_msg(&json!({"type": "play", "current_time": 42.5})).unwrap();
        let snap = rooms.apply_host_update("r", "alice", Some(&up)).await.unwrap();
        assert!(snap.is_playing);
        assert_eq!(snap.current_time, 42.5);

        let up = HostUpdate::from_msg(&json!({"type": "pause", "current_time": 50.0})).unwrap();
        let snap = rooms.apply_host_update("r", "alice", Some(&up)).await.unwrap();
        assert!(!snap.is_playing);
        assert_eq!(snap.current_time, 50.0);
    }

    #[tokio::test]
    async fn seek_never_changes_playing_flag() {
        let rooms = Rooms::default();
        let (t, _r) = tx();
        rooms.join("r", "alice", t).await;

        let play = HostUpdate::from_msg(&json!({"type": "play", "current_time": 1.0})).unwrap();
        rooms.apply_host_update("r", "alice", Some(&play)).await;

        let seek = HostUpdate::from_msg(&json!({"type": "seek", "current_time": 90.0})).unwrap();
        let snap = rooms.apply_host_update("r", "alice", Some(&seek)).await.unwrap();
        assert!(snap.is_playing);
        assert_eq!(snap.current_time, 90.0);

        let pause = HostUpdate::from_msg(&json!({"type": "pause", "current_time": 91.0})).unwrap();
        rooms.apply_host_update("r", "alice", Some(&pause)).await;
        let snap = rooms.apply_host_update("r", "alice", Some(&seek)).await.unwrap();
        assert!(!snap.is_playing);
    }

    #[tokio::test]
    async fn song_change_resets_offset_and_pauses() {
        let rooms = Rooms::default();
        let (t, _r) = tx();
        rooms.join("r", "alice", t).await;

        let play = HostUpdate::from_msg(&json!({"type": "play", "current_time": 120.0})).unwrap();
        rooms.apply_host_update("r", "alice", Some(&play)).await;

        let song = json!({"id": "abc123", "title": "Some Track"});
        let change =
            HostUpdate::from_msg(&json!({"type": "song_change", "song": song.clone()})).unwrap();
        let snap = rooms.apply_host_update("r", "alice", Some(&change)).await.unwrap();
        assert_eq!(snap.current_song, Some(song));
        assert_eq!(snap.current_time, 0.0);
        assert!(!snap.is_playing);
    }

    #[tokio::test]
    async fn offsets_clamp_at_zero() {
        let rooms = Rooms::default();
        let (t, _r) = tx();
        rooms.join("r", "alice", t).await;

        let up = HostUpdate::from_msg(&json!({"type": "seek", "current_time": -3.0})).unwrap();
        let snap = rooms.apply_host_update("r", "alice", Some(&up)).await.unwrap();
        assert_eq!(snap.current_time, 0.0);
    }

    #[tokio::test]
    async fn listener_update_is_rejected_without_mutation() {
        let rooms = Rooms::default();
        let (t1, _r1) = tx();
        let (t2, _r2) = tx();
        rooms.join("r", "alice", t1).await;
        rooms.join("r", "bob", t2).await;
        let before = rooms.snapshot("r").await.unwrap();

        let up = HostUpdate::from_msg(&json!({"type": "play", "current_time": 10.0})).unwrap();
        assert!(rooms.apply_host_update("r", "bob", Some(&up)).await.is_none());

        let after = rooms.snapshot("r").await.unwrap();
        assert!(!after.is_playing);
        assert_eq!(after.current_time, 0.0);
        assert_eq!(after.last_update, before.last_update);
    }

    #[tokio::test]
    async fn relay_only_host_message_keeps_state() {
        let rooms = Rooms::default();
        let (t, _r) = tx();
        rooms.join("r", "alice", t).await;
        let before = rooms.snapshot("r").await.unwrap();

        // recognized sender, unrecognized kind: snapshot comes back, nothing moves
        let snap = rooms.apply_host_update("r", "alice", None).await.unwrap();
        assert_eq!(snap.last_update, before.last_update);
        assert!(!snap.is_playing);
    }

    #[tokio::test]
    async fn last_member_leaving_destroys_room() {
        let rooms = Rooms::default();
        let (t1, _r1) = tx();
        let (t2, _r2) = tx();
        let a = rooms.join("r", "alice", t1).await;
        let b = rooms.join("r", "bob", t2).await;

        match rooms.leave("r", a.conn_id).await {
            LeaveOutcome::Remaining(snap) => assert_eq!(snap.listener_count, 1),
            _ => panic!("room should still be live"),
        }
        assert!(matches!(rooms.leave("r", b.conn_id).await, LeaveOutcome::Destroyed));
        assert!(rooms.snapshot("r").await.is_none());
    }

    #[tokio::test]
    async fn broadcast_reaps_broken_peer() {
        let rooms = Rooms::default();
        let (t1, r1) = tx();
        let (t2, mut r2) = tx();
        let a = rooms.join("r", "alice", t1).await;
        rooms.join("r", "bob", t2).await;

        drop(r1);
        assert_eq!(rooms.broadcast("r", "payload", None).await, 1);
        assert_eq!(r2.try_recv().unwrap(), "payload");
        assert_eq!(rooms.snapshot("r").await.unwrap().listener_count, 1);

        // reaped host connection never hears later broadcasts
        assert_eq!(rooms.broadcast("r", "again", Some(a.conn_id)).await, 1);
    }

    #[tokio::test]
    async fn broadcast_to_unknown_room_is_noop() {
        let rooms = Rooms::default();
        assert_eq!(rooms.broadcast("nope", "x", None).await, 0);
    }

    #[test]
    fn from_msg_ignores_unknown_and_untyped() {
        assert!(HostUpdate::from_msg(&json!({"type": "sync_request"})).is_none());
        assert!(HostUpdate::from_msg(&json!({"current_time": 3.0})).is_none());
    }
}
