//! The per-connection handshake state machine.
//!
//! One machine owns one connection's protocol state: the byte buffer, the
//! lifecycle phase, the handshake sub-state, and the negotiated version. It
//! is driven entirely by its caller (bytes arrived, frame written, timer
//! fired, peer closed) and answers with the ordered [`Action`]s to carry
//! out. All processing is synchronous computation over already-delivered
//! bytes; the machine never touches a socket.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::core::{ConnectionId, EngineConfig, PortDescriptor, ProtocolVersion, SwitchDescriptor};
use crate::versions::{AdapterTable, VersionAdapter};
use crate::wire::{decode_hello_frame, Body, Frame, FrameSlicer, Message};

use super::negotiation::{negotiate, Negotiation};

/// Transport lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Accepted, no hello seen yet.
    New,
    /// Version negotiated, feature discovery in progress.
    Setup,
    /// Handshake complete, usable by application logic.
    Established,
    /// Closed normally (by either side).
    Finished,
    /// Closed on protocol failure.
    Failed,
}

/// Handshake sub-state. Only ever advances forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// No handshake progress yet.
    None,
    /// Features request built but not yet on the wire.
    SendingFeatures,
    /// Features request sent; awaiting the reply.
    WaitingFeaturesReply,
    /// Feature discovery finished.
    HandshakeComplete,
    /// Hello or negotiation failed.
    HelloFailed,
}

/// Why a connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A frame or body failed to decode.
    DecodeFailure,
    /// No mutually supported protocol version.
    NegotiationFailure,
    /// The handshake deferral queue exceeded its cap.
    SetupQueueOverflow,
    /// The peer closed the transport.
    PeerClosed,
    /// Local shutdown.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DecodeFailure => "decode failure",
            Self::NegotiationFailure => "negotiation failure",
            Self::SetupQueueOverflow => "setup queue overflow",
            Self::PeerClosed => "peer closed",
            Self::Shutdown => "shutdown",
        })
    }
}

/// One side effect the runtime must carry out, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Encode and write this message, then report back via
    /// [`ConnectionMachine::on_frame_written`].
    Send(Message),
    /// Publish an inbound message to consumers.
    PublishIn(Message),
    /// Publish the version-agnostic hello-failure lifecycle event.
    NotifyHelloFailed,
    /// Hand the discovered switch to the registry.
    SwitchDiscovered(SwitchDescriptor),
    /// Hand out-of-band port descriptions to the registry.
    PortsDiscovered(Vec<PortDescriptor>),
    /// Close the transport; no further actions follow.
    Close(CloseReason),
}

/// State machine for one connection.
#[derive(Debug)]
pub struct ConnectionMachine {
    id: ConnectionId,
    phase: ConnectionPhase,
    handshake: HandshakePhase,
    adapters: AdapterTable,
    adapter: Option<VersionAdapter>,
    slicer: FrameSlicer,
    deferred: VecDeque<Frame>,
    setup_queue_limit: usize,
    send_set_config: bool,
    send_features_request_on_echo: bool,
    last_seen: Instant,
    next_xid: u32,
}

impl ConnectionMachine {
    /// Create the machine for a freshly accepted connection.
    pub fn new(id: ConnectionId, config: &EngineConfig) -> Self {
        Self {
            id,
            phase: ConnectionPhase::New,
            handshake: HandshakePhase::None,
            adapters: AdapterTable::new(&config.supported_versions),
            adapter: None,
            slicer: FrameSlicer::new(config.max_frame_length),
            deferred: VecDeque::new(),
            setup_queue_limit: config.setup_queue_limit,
            send_set_config: config.send_set_config,
            send_features_request_on_echo: config.send_features_request_on_echo,
            last_seen: Instant::now(),
            next_xid: 0,
        }
    }

    /// Connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Current handshake sub-state.
    pub fn handshake_phase(&self) -> HandshakePhase {
        self.handshake
    }

    /// The negotiated protocol version, once negotiation has happened.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.adapter.map(VersionAdapter::version)
    }

    /// Whether the handshake has completed.
    pub fn is_established(&self) -> bool {
        self.phase == ConnectionPhase::Established
    }

    /// Whether the connection is finished or failed.
    pub fn is_closed(&self) -> bool {
        matches!(
            self.phase,
            ConnectionPhase::Finished | ConnectionPhase::Failed
        )
    }

    /// When bytes were last delivered for this connection.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    fn next_xid(&mut self) -> u32 {
        self.next_xid = self.next_xid.wrapping_add(1);
        self.next_xid
    }

    /// The adapter used before negotiation settles one: the highest
    /// supported version.
    fn hello_adapter(&self) -> Option<VersionAdapter> {
        self.adapters
            .max_version()
            .and_then(|version| self.adapters.get(version))
    }

    /// The peer transport was accepted: greet it with a hello advertising
    /// every locally supported version.
    pub fn on_peer_connected(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.phase != ConnectionPhase::New {
            return actions;
        }

        match self.hello_adapter() {
            Some(adapter) => {
                let xid = self.next_xid();
                let supported = self.adapters.versions();
                actions.push(Action::Send(adapter.build_hello(xid, &supported)));
            }
            None => {
                warn!("connection {}: no protocol version configured", self.id);
                self.handshake = HandshakePhase::HelloFailed;
                self.close(&mut actions, ConnectionPhase::Failed, CloseReason::NegotiationFailure);
            }
        }
        actions
    }

    /// Process newly delivered bytes.
    ///
    /// Bytes for a closed connection are discarded and produce no actions.
    pub fn handle_bytes(&mut self, data: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.is_closed() {
            return actions;
        }
        self.last_seen = Instant::now();

        let frames = match self.slicer.push(data) {
            Ok(frames) => frames,
            Err(err) => {
                warn!("connection {}: framing failed: {err}", self.id);
                self.fail_decode(&mut actions);
                return actions;
            }
        };

        for frame in frames {
            if self.is_closed() {
                break;
            }
            match self.phase {
                ConnectionPhase::New => self.process_first_frame(frame, &mut actions),
                ConnectionPhase::Setup => self.process_setup_frame(frame, &mut actions),
                ConnectionPhase::Established => {
                    self.process_established_frame(frame, &mut actions)
                }
                ConnectionPhase::Finished | ConnectionPhase::Failed => break,
            }
        }
        actions
    }

    /// A frame produced by [`Action::Send`] reached the transport.
    ///
    /// The features sub-state advances only here: a features reply must
    /// never be accepted for a request that was merely queued.
    pub fn on_frame_written(&mut self, message: &Message) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.is_closed() {
            return actions;
        }
        let Some(adapter) = self.adapter else {
            return actions;
        };

        match &message.body {
            Body::FeaturesRequest if self.handshake == HandshakePhase::SendingFeatures => {
                self.handshake = HandshakePhase::WaitingFeaturesReply;
                self.reprocess_deferred(&mut actions);
            }
            Body::EchoReply(_)
                if self.send_features_request_on_echo && self.is_established() =>
            {
                let xid = self.next_xid();
                actions.push(Action::Send(adapter.build_features_request(xid)));
            }
            _ => {}
        }
        actions
    }

    /// Periodic keepalive tick. Does nothing before establishment.
    pub fn tick_keepalive(&mut self, echo: bool, poll_stats: bool) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.is_established() {
            return actions;
        }
        let Some(adapter) = self.adapter else {
            return actions;
        };

        if echo {
            let xid = self.next_xid();
            actions.push(Action::Send(adapter.build_echo_request(xid)));
        }
        if poll_stats {
            let xid = self.next_xid();
            actions.push(Action::Send(adapter.build_flow_stats_request(xid)));
        }
        actions
    }

    /// The peer closed the transport.
    pub fn on_peer_closed(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.is_closed() {
            self.close(&mut actions, ConnectionPhase::Finished, CloseReason::PeerClosed);
        }
        actions
    }

    /// Locally initiated shutdown. Idempotent.
    pub fn shutdown(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.is_closed() {
            self.close(&mut actions, ConnectionPhase::Finished, CloseReason::Shutdown);
        }
        actions
    }

    fn close(&mut self, actions: &mut Vec<Action>, phase: ConnectionPhase, reason: CloseReason) {
        self.slicer.clear();
        self.deferred.clear();
        self.phase = phase;
        actions.push(Action::Close(reason));
    }

    /// Decode failures fail the connection during setup and finish it once
    /// established.
    fn fail_decode(&mut self, actions: &mut Vec<Action>) {
        if self.is_established() {
            self.close(actions, ConnectionPhase::Finished, CloseReason::DecodeFailure);
        } else {
            self.handshake = HandshakePhase::HelloFailed;
            self.close(actions, ConnectionPhase::Failed, CloseReason::DecodeFailure);
        }
    }

    /// First frame on a new connection: must be a hello; negotiate from it.
    fn process_first_frame(&mut self, frame: Frame, actions: &mut Vec<Action>) {
        let (header, hello) = match decode_hello_frame(&frame) {
            Ok(parts) => parts,
            Err(err) => {
                debug!("connection {}: invalid hello message: {err}", self.id);
                self.fail_decode(actions);
                return;
            }
        };

        match negotiate(&self.adapters.versions(), &hello, header.version) {
            Negotiation::Agreed(version) => {
                let Some(adapter) = self.adapters.get(version) else {
                    self.fail_decode(actions);
                    return;
                };
                self.adapter = Some(adapter);
                self.phase = ConnectionPhase::Setup;
                self.handshake = HandshakePhase::SendingFeatures;
                debug!("connection {}: hello complete, negotiated {version}", self.id);

                let xid = self.next_xid();
                actions.push(Action::Send(adapter.build_features_request(xid)));
            }
            Negotiation::Failed(reason) => {
                warn!("connection {}: version negotiation failed: {reason}", self.id);
                self.handshake = HandshakePhase::HelloFailed;
                actions.push(Action::NotifyHelloFailed);
                if let Some(adapter) = self.hello_adapter() {
                    actions.push(Action::Send(adapter.build_hello_failed_error(header.xid)));
                }
                self.close(actions, ConnectionPhase::Failed, CloseReason::NegotiationFailure);
            }
        }
    }

    /// A frame during setup: either the awaited features reply, or traffic
    /// to defer until the handshake finishes.
    fn process_setup_frame(&mut self, frame: Frame, actions: &mut Vec<Action>) {
        let Some(adapter) = self.adapter else {
            self.fail_decode(actions);
            return;
        };
        let message = match adapter.decode(&frame) {
            Ok(message) => message,
            Err(err) => {
                debug!("connection {}: could not unpack message: {err}", self.id);
                self.fail_decode(actions);
                return;
            }
        };

        if self.handshake == HandshakePhase::WaitingFeaturesReply {
            if let Body::FeaturesReply(descriptor) = &message.body {
                let descriptor = descriptor.clone();
                self.establish(adapter, descriptor, message, actions);
                return;
            }
        }

        // Not what the handshake is waiting for: keep it, in order, for
        // redelivery once established.
        self.deferred.push_back(frame);
        if self.deferred.len() > self.setup_queue_limit {
            warn!(
                "connection {}: more than {} frames deferred during handshake",
                self.id, self.setup_queue_limit
            );
            self.handshake = HandshakePhase::HelloFailed;
            self.close(actions, ConnectionPhase::Failed, CloseReason::SetupQueueOverflow);
        }
    }

    /// The awaited features reply arrived: record the switch, fire the
    /// version's follow-ups, and open the connection for consumers.
    fn establish(
        &mut self,
        adapter: VersionAdapter,
        descriptor: SwitchDescriptor,
        message: Message,
        actions: &mut Vec<Action>,
    ) {
        actions.push(Action::SwitchDiscovered(descriptor));
        actions.push(Action::PublishIn(message));

        if let Some(followup) = adapter.build_followup_request(self.next_xid()) {
            actions.push(Action::Send(followup));
        }
        if self.send_set_config {
            let xid = self.next_xid();
            actions.push(Action::Send(adapter.build_set_config(xid)));
        }

        self.handshake = HandshakePhase::HandshakeComplete;
        self.phase = ConnectionPhase::Established;
        info!("connection {}: openflow handshake complete", self.id);

        self.reprocess_deferred(actions);
    }

    /// Re-run deferred frames after a sub-state advance. Frames that still
    /// do not apply are re-deferred in their original order.
    fn reprocess_deferred(&mut self, actions: &mut Vec<Action>) {
        let pending: Vec<Frame> = self.deferred.drain(..).collect();
        for frame in pending {
            if self.is_closed() {
                break;
            }
            match self.phase {
                ConnectionPhase::Setup => self.process_setup_frame(frame, actions),
                ConnectionPhase::Established => self.process_established_frame(frame, actions),
                _ => break,
            }
        }
    }

    /// Established traffic: publish, answering echo requests on the way.
    fn process_established_frame(&mut self, frame: Frame, actions: &mut Vec<Action>) {
        let Some(adapter) = self.adapter else {
            self.fail_decode(actions);
            return;
        };
        let message = match adapter.decode(&frame) {
            Ok(message) => message,
            Err(err) => {
                debug!("connection {}: could not unpack message: {err}", self.id);
                self.fail_decode(actions);
                return;
            }
        };
        debug!(
            "connection {}: in ofp, version: {}, type: {}, xid: {}",
            self.id, message.header.version, message.header.message_type, message.header.xid
        );

        match &message.body {
            Body::EchoRequest(data) => {
                let reply = adapter.build_echo_reply(message.header.xid, data.clone());
                actions.push(Action::PublishIn(message));
                actions.push(Action::Send(reply));
            }
            Body::PortDescReply(ports) => {
                let ports = ports.clone();
                actions.push(Action::PortsDiscovered(ports));
                actions.push(Action::PublishIn(message));
            }
            _ => actions.push(Action::PublishIn(message)),
        }
    }
}
