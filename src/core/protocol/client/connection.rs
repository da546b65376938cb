use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ClientOptions;
use crate::core::auth::client_claims::ClaimContext;
use crate::core::auth::credentials::CredentialChainBuilder;
use crate::core::auth::identity::{IdentityProvider, IdentitySession};
use crate::core::protocol::client::events::{ClientEvent, EVENT_CHANNEL_CAPACITY};
use crate::core::protocol::client::session::{Session, SessionState};
use crate::core::protocol::client::transport::{Transport, TransportEvent};
use crate::core::protocol::crypto::key_manager::key_exchange::KeyExchange;
use crate::core::protocol::crypto::key_manager::session_keys::KeyMaterial;
use crate::core::protocol::error::{ProtocolError, ProtocolResult};
use crate::core::protocol::packets::game::handshake::{Disconnect, RequestNetworkSettings};
use crate::core::protocol::packets::game::packet::{Packet, PacketKind};
use crate::core::protocol::packets::header::WireHeader;
use crate::core::protocol::packets::processor::dispatcher::{DispatchOutcome, Listener, PacketDispatcher};
use crate::core::protocol::packets::processor::packet_service::PacketPipeline;
use crate::core::protocol::packets::processor::priority::{determine_priority, Priority};
use crate::core::protocol::packets::registry::PacketRegistry;

pub const TICK_INTERVAL: Duration = Duration::from_millis(50);
const TRANSPORT_QUEUE: usize = 4096;

pub(crate) enum Command {
    Send { packet: Packet, priority: Priority },
    Listen { kind: PacketKind, listener: Listener },
    Disconnect { ack: oneshot::Sender<()> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Everything the event loop owns. Nothing here is shared with the handle.
pub(crate) struct SessionDriver {
    pub(super) options: ClientOptions,
    pub(super) session: Session,
    pub(super) pipeline: PacketPipeline,
    pub(super) dispatcher: PacketDispatcher,
    pub(super) key_exchange: KeyExchange,
    pub(super) credentials: CredentialChainBuilder,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) identity: Arc<dyn IdentityProvider>,
    pub(super) identity_task: Option<JoinHandle<ProtocolResult<IdentitySession>>>,
    pub(super) events: broadcast::Sender<ClientEvent>,
    state_tx: watch::Sender<SessionState>,
}

struct PendingStart {
    driver: SessionDriver,
    commands: mpsc::UnboundedReceiver<Command>,
}

/// Handle to one client session. The session itself runs on its own task
/// once `connect` is called.
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    pending: Mutex<Option<PendingStart>>,
    events: broadcast::Sender<ClientEvent>,
    state: watch::Receiver<SessionState>,
    disconnecting: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub fn new(
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        identity: Arc<dyn IdentityProvider>,
    ) -> ProtocolResult<Self> {
        let protocol = options.protocol()?.number();
        let material = KeyMaterial::generate()?;
        let credentials = CredentialChainBuilder::new(
            &material,
            ClaimContext {
                game_version: options.version.clone(),
                device_os: options.device_os,
                device_model: options.device_model.clone(),
                server_address: options.server_address(),
                third_party_name: options.username.clone(),
            },
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Created);

        let driver = SessionDriver {
            pipeline: PacketPipeline::new(options.compression_level),
            dispatcher: PacketDispatcher::new(PacketRegistry::for_protocol(protocol)),
            key_exchange: KeyExchange::new(material),
            session: Session::new(protocol),
            credentials,
            transport,
            identity,
            identity_task: None,
            events: events.clone(),
            state_tx,
            options,
        };

        Ok(Self {
            commands: commands_tx,
            pending: Mutex::new(Some(PendingStart {
                driver,
                commands: commands_rx,
            })),
            events,
            state: state_rx,
            disconnecting: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    /// Starts the transport and the session loop. Returns once the transport
    /// was asked to connect; joining is observed through `ClientEvent::Spawn`.
    pub async fn connect(&self) -> ProtocolResult<()> {
        let PendingStart {
            mut driver,
            commands,
        } = self.pending.lock().await.take().ok_or_else(|| ProtocolError::InternalError {
            details: "connect() called twice".to_string(),
        })?;

        let identity = driver.identity.clone();
        driver.identity_task = Some(tokio::spawn(async move { identity.authenticate().await }));

        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_QUEUE);
        driver.set_state(SessionState::AwaitingTransportConnect);
        if let Err(e) = driver.transport.connect(transport_tx).await {
            driver.shutdown(&format!("transport failed to connect: {}", e), false).await;
            return Err(e.log());
        }

        info!("Connecting to {}", driver.options.server_address());
        let task = tokio::spawn(driver.run(transport_rx, commands));
        *self.task.lock().await = Some(task);
        Ok(())
    }

    /// Queues a packet. Serialization problems are logged by the session and
    /// the packet is dropped.
    pub fn send_packet(&self, packet: impl Into<Packet>, priority: Priority) -> ProtocolResult<()> {
        self.commands
            .send(Command::Send {
                packet: packet.into(),
                priority,
            })
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Registers a listener for every decoded packet of `kind`.
    pub fn on<F>(&self, kind: PacketKind, listener: F)
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        if self
            .commands
            .send(Command::Listen {
                kind,
                listener: Arc::new(listener),
            })
            .is_err()
        {
            debug!("Listener for {:?} ignored, session is gone", kind);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the session reaches `Disconnected`.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| s.is_closed()).await;
    }

    /// Sends a disconnect packet and closes the transport. Calling it again,
    /// or after the server already closed the session, does nothing.
    pub async fn disconnect(&self) -> ProtocolResult<()> {
        if self.disconnecting.swap(true, Ordering::SeqCst) {
            debug!("disconnect() already in progress");
            return Ok(());
        }

        if let Some(pending) = self.pending.lock().await.take() {
            // Never connected: nothing on the wire to close.
            let mut driver = pending.driver;
            driver.set_state(SessionState::Disconnected);
            return Ok(());
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Disconnect { ack: ack_tx }).is_err() {
            return Ok(());
        }
        if ack_rx.await.is_err() {
            debug!("Session loop ended before acknowledging disconnect");
        }

        if let Some(task) = self.task.lock().await.take() {
            task.await?;
        }
        Ok(())
    }
}

impl SessionDriver {
    pub(super) fn set_state(&mut self, next: SessionState) {
        if self.session.transition(next) {
            debug!("Session state -> {:?}", next);
            let _ = self.state_tx.send(next);
        }
    }

    pub(super) fn emit(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn run(
        mut self,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let flow = tokio::select! {
                _ = ticker.tick() => {
                    let tick = self.session.advance_tick();
                    self.emit(ClientEvent::Tick(tick));
                    Flow::Continue
                }
                event = transport_rx.recv() => match event {
                    Some(event) => self.on_transport_event(event).await,
                    None => {
                        self.shutdown("transport went away", false).await;
                        Flow::Stop
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => {
                        self.shutdown("connection handle dropped", true).await;
                        Flow::Stop
                    }
                },
            };

            if flow == Flow::Stop {
                break;
            }
        }

        info!("🛑 Session loop stopped after {} ticks", self.session.tick);
    }

    async fn on_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Send { packet, priority } => {
                self.send(packet, priority).await;
                Flow::Continue
            }
            Command::Listen { kind, listener } => {
                self.dispatcher.on(kind, listener);
                Flow::Continue
            }
            Command::Disconnect { ack } => {
                self.shutdown("client disconnect", true).await;
                let _ = ack.send(());
                Flow::Stop
            }
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) -> Flow {
        match event {
            TransportEvent::Connected => {
                info!("Transport connected, requesting network settings");
                self.set_state(SessionState::AwaitingNetworkSettings);
                let request = RequestNetworkSettings {
                    protocol: self.session.protocol,
                };
                self.reply(request.into()).await;
                Flow::Continue
            }
            TransportEvent::Encapsulated(payload) => self.on_payload(payload).await,
            TransportEvent::Closed { reason } => {
                self.shutdown(&reason, false).await;
                Flow::Stop
            }
        }
    }

    async fn on_payload(&mut self, payload: Bytes) -> Flow {
        match WireHeader::classify(&payload) {
            Some(WireHeader::Game) => {}
            Some(WireHeader::Disconnect) => {
                self.shutdown("server closed the connection", false).await;
                return Flow::Stop;
            }
            Some(WireHeader::Unknown(header)) => {
                warn!("Unknown payload header 0x{:02X} ({} bytes)", header, payload.len());
                return Flow::Continue;
            }
            None => return Flow::Continue,
        }

        let frames = self.pipeline.consume_inbound(payload.slice(1..));

        // One frame at a time: listeners, then the session, then the next frame.
        for frame in frames {
            let packet = match self.dispatcher.dispatch(frame) {
                DispatchOutcome::Dispatched(packet) => packet,
                _ => continue,
            };

            self.emit(ClientEvent::Packet(packet.clone()));
            if let Err(e) = self.handle_packet(&packet).await {
                if e.is_fatal() {
                    error!("Fatal error while handling {:?}: {}", packet.kind(), e);
                    self.shutdown(&e.to_string(), false).await;
                    return Flow::Stop;
                }
                warn!("Error while handling {:?}: {}", packet.kind(), e);
            }
            if self.session.state.is_closed() {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// The single outbound path. Failures are logged and the packet dropped.
    async fn send(&mut self, packet: Packet, priority: Priority) {
        if self.session.state.is_closed() {
            debug!("Not sending {:?}, session is closed", packet.kind());
            return;
        }

        let kind = packet.kind();
        let payload = match self.pipeline.encode(std::slice::from_ref(&packet)) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize {:?}: {}", kind, e);
                return;
            }
        };

        debug!("C -> S {:?} ({} bytes, {:?})", kind, payload.len(), priority);
        if let Err(e) = self.transport.send(payload, priority).await {
            warn!("Failed to send {:?}: {}", kind, e);
        }
    }

    /// Internal replies take the priority of their packet kind.
    pub(super) async fn reply(&mut self, packet: Packet) {
        let priority = determine_priority(packet.kind());
        self.send(packet, priority).await;
    }

    /// Closes the session once. Client-initiated closes say goodbye first.
    pub(super) async fn shutdown(&mut self, reason: &str, client_initiated: bool) {
        if self.session.state.is_closed() {
            return;
        }

        if client_initiated {
            self.reply(Disconnect::normal().into()).await;
        }
        if let Err(e) = self.transport.close().await {
            debug!("Transport close failed: {}", e);
        }
        if let Some(task) = self.identity_task.take() {
            task.abort();
        }

        self.set_state(SessionState::Disconnected);
        self.dispatcher.clear();
        info!("Disconnected: {}", reason);
        self.emit(ClientEvent::Disconnected {
            reason: reason.to_string(),
        });
    }
}
