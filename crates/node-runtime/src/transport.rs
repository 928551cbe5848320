//! # TCP Transport
//!
//! One task per connection. Each task owns a `Framed<TcpStream, PacketCodec>`,
//! registers an outbox with the [`ChannelSender`] (so the connection counts
//! toward the active-peer total) and hands every inbound packet to the
//! [`PacketDispatcher`] on its own task.
//!
//! A codec protocol error closes that connection only.

use block_sync::adapters::ChannelSender;
use block_sync::ConnectionContext;
use futures::{SinkExt, StreamExt};
use shared_types::NodeId;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use sync_wire::{PacketCodec, WireConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::dispatch::PacketDispatcher;

/// Peer transport shared by the listener and dialers.
pub struct Transport {
    wire: WireConfig,
    registry: Arc<ChannelSender>,
    dispatcher: Arc<PacketDispatcher>,
    shutdown: watch::Receiver<bool>,
}

impl Transport {
    /// Create a transport. Connections stop when `shutdown` flips to true.
    pub fn new(
        wire: WireConfig,
        registry: Arc<ChannelSender>,
        dispatcher: Arc<PacketDispatcher>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            wire,
            registry,
            dispatcher,
            shutdown,
        }
    }

    /// Accept connections on `listener` until shutdown.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        tokio::spawn(self.clone().run_connection(stream, remote));
                    }
                    Err(e) => warn!("[net] Accept failed: {}", e),
                },
                _ = shutdown.changed() => {
                    info!("[net] Listener shutting down");
                    break;
                }
            }
        }
    }

    /// Connect to `addr` and run the connection on a new task.
    pub async fn dial(self: Arc<Self>, addr: SocketAddr) -> io::Result<()> {
        let stream = TcpStream::connect(addr).await?;
        tokio::spawn(self.run_connection(stream, addr));
        Ok(())
    }

    async fn run_connection(self: Arc<Self>, stream: TcpStream, remote: SocketAddr) {
        let label = remote.to_string();
        let peer_id = NodeId::from_label(&label);
        let framed = Framed::new(stream, PacketCodec::new(self.wire.clone(), label.clone()));
        let (mut sink, mut inbound) = framed.split();

        let (outbox, mut outgoing) = mpsc::unbounded_channel();
        let registration = self.registry.register(peer_id.clone(), outbox);
        info!(
            "[net] Peer {} connected ({} active)",
            label,
            self.registry.active_peers()
        );

        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                packet = inbound.next() => match packet {
                    Some(Ok(packet)) => {
                        let ctx = ConnectionContext {
                            peer_id: peer_id.clone(),
                            remote: label.clone(),
                            active_peers: self.registry.active_peers(),
                        };
                        let dispatcher = self.dispatcher.clone();
                        tokio::spawn(async move {
                            if let Err(e) = dispatcher.dispatch(packet, &ctx).await {
                                warn!("[net] Packet from {} failed: {}", ctx.remote, e);
                            }
                        });
                    }
                    Some(Err(e)) => {
                        warn!("[net] Closing connection to {}: {}", label, e);
                        break;
                    }
                    None => {
                        debug!("[net] Peer {} closed the connection", label);
                        break;
                    }
                },
                packet = outgoing.recv() => match packet {
                    Some(packet) => {
                        if let Err(e) = sink.send(packet).await {
                            warn!("[net] Send to {} failed: {}", label, e);
                            break;
                        }
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }

        self.registry.unregister(&peer_id, registration);
        info!(
            "[net] Peer {} disconnected ({} active)",
            label,
            self.registry.active_peers()
        );
    }
}
