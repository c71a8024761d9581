use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 每條連線的出站緩衝
pub const PEER_BUFFER: usize = 64;

pub type ConnId = u64;
pub type PeerTx = mpsc::Sender<String>;

pub struct Peer {
    pub user_id: String,
    tx: PeerTx,
}

/* ------------ 房間內的連線集合 ------------ */
#[derive(Default)]
pub struct Peers {
    map: HashMap<ConnId, Peer>,
}

impl Peers {
    pub fn register(&mut self, conn_id: ConnId, user_id: &str, tx: PeerTx) {
        self.map.insert(conn_id, Peer { user_id: user_id.to_string(), tx });
    }

    pub fn unregister(&mut self, conn_id: ConnId) -> bool {
        self.map.remove(&conn_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Fan a payload out to every member except `exclude`. A send that fails
    /// (receiver gone, or a hopelessly backed-up channel) marks the peer, and
    /// marked peers are swept out after delivery to the rest. Returns how
    /// many peers actually received the payload.
    pub fn broadcast(&mut self, payload: &str, exclude: Option<ConnId>) -> usize {
        let mut dead: Vec<ConnId> = Vec::new();
        let mut delivered = 0usize;

        for (&id, peer) in &self.map {
            if Some(id) == exclude {
                continue;
            }
            match peer.tx.try_send(payload.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(conn_id = id, user_id = %peer.user_id, "send failed, dropping peer: {e}");
                    dead.push(id);
                }
            }
        }

        for id in dead {
            self.map.remove(&id);
        }
        debug!(delivered, remaining = self.map.len(), "broadcast");
        delivered
    }
}
