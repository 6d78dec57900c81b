//! The engine runtime: listener, per-connection tasks, and wiring.
//!
//! One task owns each connection's socket and state machine, so inbound
//! bytes are always processed sequentially, in arrival order, with no
//! per-connection locking. Separate connections run on separate tasks and
//! never share mutable state; the only cross-connection data is the
//! read-only adapter table inside each machine and the registry behind its
//! trait.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::{ConnectionId, EngineConfig, EngineError, SwitchRecord, SwitchRegistry};
use crate::event::{Direction, EngineEvent};
use crate::gateway::{event_name_for, Command, EventGateway};
use crate::handshake::{Action, CloseReason, ConnectionMachine};
use crate::keepalive::KeepaliveScheduler;
use crate::versions::{encode_message, AdapterTable};

const RECV_BUFFER_SIZE: usize = 65535;

/// The OpenFlow connection engine.
///
/// Binds a TCP listener, drives every accepted switch connection through
/// the version-negotiation and feature-discovery handshake, and exposes the
/// resulting traffic through the [`EventGateway`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use ofcore::prelude::*;
///
/// let config = EngineConfigBuilder::new()
///     .listen_addr("0.0.0.0:6653".parse()?)
///     .build();
/// let registry = Arc::new(MemoryRegistry::new());
///
/// let (engine, mut events) = OfEngine::bind(config, registry).await?;
/// while let Some(event) = events.recv().await {
///     match event {
///         EngineEvent::MessageIn { name, message, .. } => {
///             println!("{name}: xid {}", message.xid());
///         }
///         _ => {}
///     }
/// }
/// ```
pub struct OfEngine {
    config: EngineConfig,
    gateway: EventGateway,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    keepalive_task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl OfEngine {
    /// Bind the listener and start accepting switch connections.
    ///
    /// Returns the engine handle and the consumer event channel.
    pub async fn bind(
        config: EngineConfig,
        registry: Arc<dyn SwitchRegistry>,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>), EngineError> {
        if AdapterTable::new(&config.supported_versions).is_empty() {
            return Err(EngineError::NoUsableVersion);
        }

        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|err| EngineError::BindFailed(err.to_string()))?;
        let local_addr = listener.local_addr()?;

        let (events_tx, events_rx) = mpsc::channel(256);
        let gateway = EventGateway::new(events_tx);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let accept_gateway = gateway.clone();
        let accept_config = config.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            info!("connection {peer}: new switch connection");
                            let gateway = accept_gateway.clone();
                            let config = accept_config.clone();
                            let registry = Arc::clone(&registry);
                            tokio::spawn(run_connection(stream, peer, config, gateway, registry));
                        }
                        Err(err) => warn!("accept failed: {err}"),
                    },
                }
            }
        });

        let keepalive_task = if config.send_echo_requests || config.poll_flow_stats {
            let scheduler = KeepaliveScheduler::new(
                gateway.clone(),
                config.keepalive_interval,
                config.send_echo_requests,
                config.poll_flow_stats,
            );
            Some(tokio::spawn(scheduler.run()))
        } else {
            None
        };

        let engine = Self {
            config,
            gateway,
            local_addr,
            accept_task,
            keepalive_task,
            shutdown_tx: Some(shutdown_tx),
        };
        Ok((engine, events_rx))
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The gateway consumers use to send messages to switches.
    pub fn gateway(&self) -> &EventGateway {
        &self.gateway
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.gateway.connection_count().await
    }

    /// Stop accepting, close every connection, and tear the engine down.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.keepalive_task.take() {
            task.abort();
        }
        for (_, mailbox) in self.gateway.mailboxes().await {
            let _ = mailbox.send(Command::Shutdown).await;
        }
        let _ = (&mut self.accept_task).await;
    }
}

impl Drop for OfEngine {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.keepalive_task.take() {
            task.abort();
        }
    }
}

/// Executes a machine's actions against the transport, gateway, and
/// registry. Owned by the connection task alongside the machine.
struct ActionRunner {
    id: ConnectionId,
    gateway: EventGateway,
    registry: Arc<dyn SwitchRegistry>,
    writer: OwnedWriteHalf,
    switch: Option<Arc<SwitchRecord>>,
}

impl ActionRunner {
    /// Carry out actions in order. Returns the close reason when one of
    /// them ends the connection.
    async fn run(
        &mut self,
        machine: &mut ConnectionMachine,
        actions: Vec<Action>,
    ) -> Option<CloseReason> {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Send(message) => {
                    let bytes = match encode_message(&message) {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            warn!("connection {}: cannot encode outbound message: {err}", self.id);
                            continue;
                        }
                    };
                    if let Err(err) = self.writer.write_all(&bytes).await {
                        debug!("connection {}: write failed: {err}", self.id);
                        machine.on_peer_closed();
                        return Some(CloseReason::PeerClosed);
                    }

                    // The frame is on the wire now; only here may the
                    // machine treat it as sent.
                    queue.extend(machine.on_frame_written(&message));

                    let name = event_name_for(&message, Direction::Out);
                    self.gateway
                        .publish_event(EngineEvent::MessageOut {
                            connection: self.id,
                            name,
                            message,
                        })
                        .await;
                }
                Action::PublishIn(message) => {
                    let name = event_name_for(&message, Direction::In);
                    self.gateway.publish_inbound(self.id, name, message).await;
                }
                Action::NotifyHelloFailed => {
                    self.gateway
                        .publish_event(EngineEvent::HelloFailed {
                            connection: self.id,
                        })
                        .await;
                }
                Action::SwitchDiscovered(descriptor) => {
                    let switch = self
                        .registry
                        .get_or_create_switch(descriptor.dpid, self.id);
                    switch.update_features(&descriptor);
                    self.gateway
                        .publish_event(EngineEvent::HandshakeComplete {
                            connection: self.id,
                            dpid: descriptor.dpid,
                        })
                        .await;
                    self.switch = Some(switch);
                }
                Action::PortsDiscovered(ports) => {
                    if let Some(switch) = &self.switch {
                        switch.update_ports(ports);
                    }
                }
                Action::Close(reason) => return Some(reason),
            }
        }
        None
    }
}

/// One connection's lifetime, from accept to close.
async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: EngineConfig,
    gateway: EventGateway,
    registry: Arc<dyn SwitchRegistry>,
) {
    let id = ConnectionId::new(peer);
    let (command_tx, mut command_rx) = mpsc::channel(64);
    gateway.register(id, command_tx).await;

    let (mut reader, writer) = stream.into_split();
    let mut machine = ConnectionMachine::new(id, &config);
    let mut runner = ActionRunner {
        id,
        gateway: gateway.clone(),
        registry,
        writer,
        switch: None,
    };

    let greeting = machine.on_peer_connected();
    let mut close_reason = runner.run(&mut machine, greeting).await;

    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    while close_reason.is_none() {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let actions = match read {
                    Ok(0) => machine.on_peer_closed(),
                    Ok(n) => {
                        if let Some(switch) = &runner.switch {
                            switch.update_last_seen();
                        }
                        machine.handle_bytes(&buf[..n])
                    }
                    Err(err) => {
                        debug!("connection {id}: read failed: {err}");
                        machine.on_peer_closed()
                    }
                };
                close_reason = runner.run(&mut machine, actions).await;
            }
            command = command_rx.recv() => {
                let actions = match command {
                    Some(Command::Deliver(message)) => vec![Action::Send(message)],
                    Some(Command::Tick { echo, poll_stats }) => {
                        machine.tick_keepalive(echo, poll_stats)
                    }
                    Some(Command::Shutdown) | None => machine.shutdown(),
                };
                close_reason = runner.run(&mut machine, actions).await;
            }
        }
    }

    gateway.unregister(id).await;
    let reason = close_reason.unwrap_or(CloseReason::PeerClosed);
    gateway
        .publish_event(EngineEvent::ConnectionClosed {
            connection: id,
            reason,
        })
        .await;
    info!("connection {id}: closed ({reason})");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DatapathId, EngineConfigBuilder, MemoryRegistry, ProtocolVersion};
    use crate::versions::{v0x01, VersionAdapter};
    use crate::wire::{Body, Frame, FrameSlicer, Header, HelloBody, Message};
    use std::time::Duration;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    async fn read_frames(stream: &mut TcpStream, slicer: &mut FrameSlicer, want: usize) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut buf = [0u8; 4096];
        while frames.len() < want {
            let n = timeout(TEST_TIMEOUT, stream.read(&mut buf))
                .await
                .expect("read timed out")
                .expect("read failed");
            assert_ne!(n, 0, "engine closed the connection early");
            frames.extend(slicer.push(&buf[..n]).expect("engine sent bad framing"));
        }
        frames
    }

    fn switch_hello() -> Vec<u8> {
        let body = HelloBody::with_versions(&[ProtocolVersion::OF10]).encode();
        let header = Header::new(0x01, 0, (crate::core::HEADER_SIZE + body.len()) as u16, 0x10);
        let mut wire = header.to_bytes().to_vec();
        wire.extend_from_slice(&body);
        wire
    }

    fn switch_features_reply(dpid: u64) -> Vec<u8> {
        let message = Message::new(
            Header::new(0x01, v0x01::types::FEATURES_REPLY, 0, 0x11),
            Body::FeaturesReply(crate::core::SwitchDescriptor {
                dpid: DatapathId::new(dpid),
                n_buffers: 256,
                n_tables: 2,
                capabilities: 0,
                ports: Vec::new(),
            }),
        );
        VersionAdapter::V0x01.encode(&message).unwrap()
    }

    #[tokio::test]
    async fn test_full_handshake_over_tcp() {
        let config = EngineConfigBuilder::new()
            .listen_addr("127.0.0.1:0".parse().unwrap())
            .supported_versions(vec![ProtocolVersion::OF10])
            .echo_requests(false)
            .flow_stats_polling(false)
            .build();
        let registry = Arc::new(MemoryRegistry::new());
        let (engine, mut events) = OfEngine::bind(config, registry.clone()).await.unwrap();

        let mut switch = TcpStream::connect(engine.local_addr()).await.unwrap();
        let mut slicer = FrameSlicer::new(u16::MAX);

        // The engine greets first with a hello carrying its bitmap.
        let frames = read_frames(&mut switch, &mut slicer, 1).await;
        let hello = Header::from_bytes(frames[0].as_bytes()).unwrap();
        assert_eq!(hello.message_type, 0);

        // Answer with our hello; a features request must follow.
        switch.write_all(&switch_hello()).await.unwrap();
        let frames = read_frames(&mut switch, &mut slicer, 1).await;
        let request = Header::from_bytes(frames[0].as_bytes()).unwrap();
        assert_eq!(request.message_type, v0x01::types::FEATURES_REQUEST);

        // Answer features; the handshake completes and set-config arrives.
        switch.write_all(&switch_features_reply(0x7)).await.unwrap();
        let frames = read_frames(&mut switch, &mut slicer, 1).await;
        let set_config = Header::from_bytes(frames[0].as_bytes()).unwrap();
        assert_eq!(set_config.message_type, v0x01::types::SET_CONFIG);

        let mut complete = None;
        while complete.is_none() {
            let event = timeout(TEST_TIMEOUT, events.recv())
                .await
                .expect("event timed out")
                .expect("event channel closed");
            if let EngineEvent::HandshakeComplete { dpid, .. } = event {
                complete = Some(dpid);
            }
        }
        assert_eq!(complete, Some(DatapathId::new(0x7)));
        assert!(registry.get_switch_by_id(DatapathId::new(0x7)).is_some());
        assert_eq!(engine.connection_count().await, 1);

        // Peer close finishes the connection and stops its events.
        drop(switch);
        let mut closed = false;
        while !closed {
            let event = timeout(TEST_TIMEOUT, events.recv())
                .await
                .expect("close event timed out")
                .expect("event channel closed");
            if let EngineEvent::ConnectionClosed { reason, .. } = event {
                assert_eq!(reason, CloseReason::PeerClosed);
                closed = true;
            }
        }

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_negotiation_failure_answers_with_error_then_closes() {
        let config = EngineConfigBuilder::new()
            .listen_addr("127.0.0.1:0".parse().unwrap())
            .supported_versions(vec![ProtocolVersion::OF13])
            .echo_requests(false)
            .flow_stats_polling(false)
            .build();
        let registry = Arc::new(MemoryRegistry::new());
        let (engine, mut events) = OfEngine::bind(config, registry).await.unwrap();

        let mut switch = TcpStream::connect(engine.local_addr()).await.unwrap();
        let mut slicer = FrameSlicer::new(u16::MAX);
        read_frames(&mut switch, &mut slicer, 1).await; // engine hello

        // Offer only 1.0 against an engine that speaks only 1.3.
        switch.write_all(&switch_hello()).await.unwrap();

        let frames = read_frames(&mut switch, &mut slicer, 1).await;
        let error = VersionAdapter::V0x04.decode(&frames[0]).unwrap();
        assert!(matches!(error.body, Body::Error(_)));
        assert_eq!(error.header.xid, 0x10);

        let mut failed = false;
        while !failed {
            let event = timeout(TEST_TIMEOUT, events.recv())
                .await
                .expect("event timed out")
                .expect("event channel closed");
            if let EngineEvent::HelloFailed { .. } = event {
                failed = true;
            }
        }

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_rejects_empty_version_set() {
        let config = EngineConfigBuilder::new()
            .listen_addr("127.0.0.1:0".parse().unwrap())
            .supported_versions(Vec::new())
            .build();
        let result = OfEngine::bind(config, Arc::new(MemoryRegistry::new())).await;
        assert!(matches!(result, Err(EngineError::NoUsableVersion)));
    }
}
