//! In-process scripted peer for session tests. `MockTransport` records what
//! the client sends and lets the test inject transport events; `TestServer`
//! speaks the server side of the batch format on top of it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use rand_core::{OsRng, RngCore};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::info;

use crate::config::ClientOptions;
use crate::core::auth::identity::OfflineIdentity;
use crate::core::protocol::client::connection::Connection;
use crate::core::protocol::client::events::ClientEvent;
use crate::core::protocol::client::transport::{Transport, TransportEvent};
use crate::core::protocol::crypto::encryptor::PacketEncryptor;
use crate::core::protocol::crypto::handshake::handshake::issue_challenge;
use crate::core::protocol::crypto::key_manager::key_exchange::derive_shared_secret;
use crate::core::protocol::crypto::key_manager::session_keys::{KeyMaterial, SessionKeys};
use crate::core::protocol::crypto::signature::token::decode_token_header;
use crate::core::protocol::error::{ProtocolError, ProtocolResult};
use crate::core::protocol::packets::game::handshake::{
    Login, NetworkSettings, RequestNetworkSettings, ServerToClientHandshake,
};
use crate::core::protocol::packets::game::packet::Packet;
use crate::core::protocol::packets::header::GAME_PACKET_HEADER;
use crate::core::protocol::packets::processor::dispatcher::PacketDispatcher;
use crate::core::protocol::packets::processor::packet_service::PacketPipeline;
use crate::core::protocol::packets::processor::priority::Priority;
use crate::core::protocol::packets::registry::PacketRegistry;

pub const WAIT: Duration = Duration::from_secs(5);

pub struct MockTransport {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            events: Mutex::new(None),
            outbound,
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
        });
        (transport, rx)
    }

    pub async fn inject(&self, event: TransportEvent) {
        let sender = self.events.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> ProtocolResult<()> {
        *self.events.lock().await = Some(events.clone());
        events.send(TransportEvent::Connected).await?;
        Ok(())
    }

    async fn send(&self, payload: Vec<u8>, _priority: Priority) -> ProtocolResult<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ProtocolError::Transport {
                details: "send refused".to_string(),
            });
        }
        self.outbound.send(payload)?;
        Ok(())
    }

    async fn close(&self) -> ProtocolResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestServer {
    pub transport: Arc<MockTransport>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    keys: KeyMaterial,
    pipeline: PacketPipeline,
    decoder: PacketDispatcher,
}

impl TestServer {
    pub fn new() -> Self {
        let (transport, outbound) = MockTransport::new();
        Self {
            transport,
            outbound,
            keys: KeyMaterial::generate().expect("server key"),
            pipeline: PacketPipeline::new(7),
            decoder: PacketDispatcher::new(PacketRegistry::default()),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Next raw payload the client handed to the transport.
    pub async fn next_payload(&mut self) -> Option<Vec<u8>> {
        tokio::time::timeout(WAIT, self.outbound.recv()).await.ok().flatten()
    }

    /// Decodes the next client batch.
    pub async fn next_batch(&mut self) -> Vec<Packet> {
        let payload = self.next_payload().await.expect("client sent nothing");
        assert_eq!(payload[0], GAME_PACKET_HEADER);
        let frames = self.pipeline.consume_inbound(Bytes::copy_from_slice(&payload[1..]));
        self.decoder
            .dispatch_all(frames)
            .into_iter()
            .map(|p| (*p).clone())
            .collect()
    }

    pub async fn expect(&mut self) -> Packet {
        let mut batch = self.next_batch().await;
        assert_eq!(batch.len(), 1, "expected a single packet, got {:?}", batch);
        batch.remove(0)
    }

    /// Everything the client sent so far, without waiting for more.
    pub fn drain(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(payload) = self.outbound.try_recv() {
            let frames = self.pipeline.consume_inbound(Bytes::copy_from_slice(&payload[1..]));
            packets.extend(self.decoder.dispatch_all(frames).into_iter().map(|p| (*p).clone()));
        }
        packets
    }

    pub async fn send(&mut self, packets: Vec<Packet>) {
        let payload = self.pipeline.encode(&packets).expect("server encode");
        self.send_raw(payload).await;
    }

    pub async fn send_raw(&self, payload: Vec<u8>) {
        self.transport
            .inject(TransportEvent::Encapsulated(Bytes::from(payload)))
            .await;
    }

    pub fn prepare(&mut self, framed: &[u8]) -> Vec<u8> {
        self.pipeline.prepare_payload(framed).expect("server prepare")
    }

    /// Sends network settings and switches to compressed batches.
    pub async fn send_network_settings(&mut self, threshold: u16) {
        let settings = NetworkSettings {
            compression_threshold: threshold,
            compression_method: 0,
            client_throttle: false,
            throttle_threshold: 0,
            throttle_scalar: 0.0,
        };
        self.send(vec![settings.into()]).await;
        self.pipeline.arm_compression(threshold);
    }

    /// Issues the encryption challenge for the key in the client's login and
    /// arms the server side.
    pub async fn send_challenge(&mut self, login: &Login) {
        let chain: serde_json::Value = serde_json::from_str(&login.identity).expect("chain json");
        let first = chain["chain"][0].as_str().expect("identity token");
        let client_der = STANDARD
            .decode(decode_token_header(first).expect("token header").x5u)
            .expect("client key");

        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let secret = derive_shared_secret(&self.keys, &client_der).expect("ecdh");
        let token = issue_challenge(&self.keys, &salt).expect("challenge");

        self.send(vec![ServerToClientHandshake { token }.into()]).await;

        let encryptor = PacketEncryptor::new(
            SessionKeys::derive(&salt, &secret),
            self.pipeline.effective_compression(),
        )
        .expect("server encryptor");
        self.pipeline.arm_encryption(encryptor);
        info!(target: "test_server", "Encryption armed on the server side");
    }

    pub async fn send_challenge_token(&mut self, token: String) {
        self.send(vec![ServerToClientHandshake { token }.into()]).await;
    }
}

/// Waits for the first event matching `pred`, skipping ticks and lag.
pub async fn wait_for_event<F>(events: &mut broadcast::Receiver<ClientEvent>, mut pred: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

pub const TEST_USERNAME: &str = "Steve";
pub const TEST_THRESHOLD: u16 = 256;

/// Offline client wired to `server`, already asked to connect.
pub async fn start_client(server: &TestServer) -> (Connection, broadcast::Receiver<ClientEvent>) {
    let options = ClientOptions {
        offline: true,
        username: TEST_USERNAME.to_string(),
        ..ClientOptions::default()
    };
    let connection = Connection::new(
        options,
        server.transport(),
        Arc::new(OfflineIdentity::new(TEST_USERNAME)),
    )
    .expect("client");
    let events = connection.subscribe();
    connection.connect().await.expect("connect");
    (connection, events)
}

/// Runs network settings, login and the encryption handshake. Returns the
/// client's login once both sides are encrypted.
pub async fn negotiate(server: &mut TestServer) -> Login {
    assert_eq!(
        server.expect().await,
        Packet::from(RequestNetworkSettings { protocol: 712 })
    );
    server.send_network_settings(TEST_THRESHOLD).await;

    let login = match server.expect().await {
        Packet::Login(login) => login,
        other => panic!("expected Login, got {:?}", other),
    };
    server.send_challenge(&login).await;

    match server.expect().await {
        Packet::ClientToServerHandshake(_) => {}
        other => panic!("expected ClientToServerHandshake, got {:?}", other),
    }
    login
}
