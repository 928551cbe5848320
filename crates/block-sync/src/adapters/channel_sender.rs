//! Packet sender over per-connection channels.

use parking_lot::RwLock;
use shared_types::NodeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use sync_wire::Packet;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::SyncError;
use crate::ports::PacketSender;

/// Outbox handed to a connection task.
pub type Outbox = mpsc::UnboundedSender<Packet>;

struct Registration {
    id: u64,
    outbox: Outbox,
}

/// Connection registry that doubles as the group sender.
///
/// Each live connection registers the sending half of its outbound channel;
/// the connection task drains the other half onto the socket.
#[derive(Default)]
pub struct ChannelSender {
    peers: RwLock<HashMap<NodeId, Registration>>,
    next_id: AtomicU64,
}

impl ChannelSender {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its registration id. Replaces (and
    /// so closes) any previous outbox for the same peer.
    pub fn register(&self, peer: NodeId, outbox: Outbox) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if self
            .peers
            .write()
            .insert(peer.clone(), Registration { id, outbox })
            .is_some()
        {
            debug!("[sync] Replaced outbox for peer {}", peer);
        }
        id
    }

    /// Drop the connection registered as `id`. A newer registration for the
    /// same peer is left alone. Returns true if something was removed.
    pub fn unregister(&self, peer: &NodeId, id: u64) -> bool {
        let mut peers = self.peers.write();
        if peers.get(peer).is_some_and(|r| r.id == id) {
            peers.remove(peer);
            return true;
        }
        false
    }

    /// Number of registered connections; the N of the quorum rule.
    pub fn active_peers(&self) -> usize {
        self.peers.read().len()
    }
}

impl PacketSender for ChannelSender {
    fn send_to_group(&self, packet: Packet) -> Result<usize, SyncError> {
        let peers = self.peers.read();
        let mut delivered = 0;
        for (peer, registration) in peers.iter() {
            match registration.outbox.send(packet.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => warn!("[sync] Outbox for peer {} is closed", peer),
            }
        }
        if peers.is_empty() {
            debug!("[sync] No connected peers, group send dropped");
        }
        Ok(delivered)
    }

    fn send_to_peer(&self, peer: &NodeId, packet: Packet) -> Result<(), SyncError> {
        let peers = self.peers.read();
        let registration = peers
            .get(peer)
            .ok_or_else(|| SyncError::UnknownPeer(peer.clone()))?;
        registration
            .outbox
            .send(packet)
            .map_err(|_| SyncError::Send(format!("outbox for peer {} is closed", peer)))
    }
}
