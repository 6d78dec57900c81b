//! The event gateway: the engine's only seam to the outside world.
//!
//! Inbound messages become [`EngineEvent`]s on a consumer channel; outbound
//! messages from consumers are queued to the owning connection task for
//! encoding and transmission. Publishing to a connection that is already
//! gone is a silent no-op in both directions — consumers must never observe
//! traffic for a connection they believe is closed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::core::ConnectionId;
use crate::event::{message_event_name, Direction, EngineEvent};
use crate::wire::Message;

/// Commands delivered to a connection task's mailbox.
#[derive(Debug)]
pub enum Command {
    /// Encode and transmit this message.
    Deliver(Message),
    /// Keepalive tick.
    Tick {
        /// Send an echo request.
        echo: bool,
        /// Send a flow-stats poll.
        poll_stats: bool,
    },
    /// Close the connection (engine shutdown).
    Shutdown,
}

/// The boundary between the engine and its consumers.
#[derive(Debug, Clone)]
pub struct EventGateway {
    events: mpsc::Sender<EngineEvent>,
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::Sender<Command>>>>,
}

impl EventGateway {
    pub(crate) fn new(events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            events,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish an inbound message to consumers.
    ///
    /// Dropped silently when the connection is no longer live.
    pub async fn publish_inbound(&self, connection: ConnectionId, name: String, message: Message) {
        if !self.is_live(connection).await {
            debug!("connection {connection}: dropping inbound publish after close");
            return;
        }
        let _ = self
            .events
            .send(EngineEvent::MessageIn {
                connection,
                name,
                message,
            })
            .await;
    }

    /// Queue a message for encoding and transmission on a connection.
    ///
    /// Dropped silently when the connection is no longer live.
    pub async fn publish_outbound(&self, connection: ConnectionId, message: Message) {
        let sender = self.connections.read().await.get(&connection).cloned();
        match sender {
            Some(sender) => {
                if sender.send(Command::Deliver(message)).await.is_err() {
                    debug!("connection {connection}: dropping outbound publish after close");
                }
            }
            None => {
                debug!("connection {connection}: dropping outbound publish after close");
            }
        }
    }

    /// Publish a lifecycle event. Not gated on connection liveness.
    pub(crate) async fn publish_event(&self, event: EngineEvent) {
        let _ = self.events.send(event).await;
    }

    /// Whether a connection is still registered.
    pub async fn is_live(&self, connection: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&connection)
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub(crate) async fn register(&self, connection: ConnectionId, sender: mpsc::Sender<Command>) {
        self.connections.write().await.insert(connection, sender);
    }

    pub(crate) async fn unregister(&self, connection: ConnectionId) {
        self.connections.write().await.remove(&connection);
    }

    /// Snapshot of the live connection mailboxes.
    pub(crate) async fn mailboxes(&self) -> Vec<(ConnectionId, mpsc::Sender<Command>)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    }
}

/// Compose the event name for a message in a direction.
pub fn event_name_for(message: &Message, direction: Direction) -> String {
    use crate::core::ProtocolVersion;
    use crate::versions::VersionAdapter;

    let version = ProtocolVersion::new(message.header.version);
    let type_name = VersionAdapter::for_version(version)
        .and_then(|adapter| adapter.type_name(message.header.message_type))
        .unwrap_or("ofpt_unknown");
    message_event_name(version, direction, type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::VersionAdapter;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn conn(port: u16) -> ConnectionId {
        ConnectionId::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
    }

    #[tokio::test]
    async fn test_inbound_publish_reaches_consumers() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let gateway = EventGateway::new(events_tx);
        let (command_tx, _command_rx) = mpsc::channel(8);
        gateway.register(conn(1), command_tx).await;

        let message = VersionAdapter::V0x01.build_echo_request(3);
        let name = event_name_for(&message, Direction::In);
        gateway.publish_inbound(conn(1), name, message).await;

        let event = events_rx.recv().await.unwrap();
        let EngineEvent::MessageIn { connection, name, .. } = event else {
            panic!("expected a message-in event");
        };
        assert_eq!(connection, conn(1));
        assert_eq!(name, "ofcore.v0x01.messages.in.ofpt_echo_request");
    }

    #[tokio::test]
    async fn test_publish_after_close_is_a_silent_no_op() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let gateway = EventGateway::new(events_tx);
        let (command_tx, mut command_rx) = mpsc::channel(8);
        gateway.register(conn(2), command_tx).await;
        gateway.unregister(conn(2)).await;

        let message = VersionAdapter::V0x01.build_echo_request(4);
        gateway
            .publish_inbound(conn(2), "ofcore.test".into(), message.clone())
            .await;
        gateway.publish_outbound(conn(2), message).await;

        assert!(events_rx.try_recv().is_err());
        assert!(command_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_outbound_publish_reaches_the_connection_mailbox() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let gateway = EventGateway::new(events_tx);
        let (command_tx, mut command_rx) = mpsc::channel(8);
        gateway.register(conn(3), command_tx).await;

        let message = VersionAdapter::V0x04.build_features_request(9);
        gateway.publish_outbound(conn(3), message.clone()).await;

        let Some(Command::Deliver(delivered)) = command_rx.recv().await else {
            panic!("expected a deliver command");
        };
        assert_eq!(delivered, message);
    }
}
