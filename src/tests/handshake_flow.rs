use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ClientOptions;
use crate::core::auth::identity::OfflineIdentity;
use crate::core::protocol::client::connection::Connection;
use crate::core::protocol::client::events::ClientEvent;
use crate::core::protocol::client::session::SessionState;
use crate::core::protocol::crypto::signature::token::verify_token;
use crate::core::protocol::packets::game::handshake::{
    Disconnect, PlayStatus, PlayStatusKind, RequestNetworkSettings,
};
use crate::core::protocol::packets::game::packet::Packet;
use crate::core::protocol::packets::game::resource_packs::{
    ResourcePackClientResponse, ResourcePackStack, ResourcePacksInfo,
};
use crate::core::protocol::packets::game::world::{
    RequestChunkRadius, SetLocalPlayerAsInitialized, StartGame,
};
use crate::test_server::{
    negotiate, start_client, wait_for_event, TestServer, TEST_THRESHOLD, TEST_USERNAME,
};

fn status(status: PlayStatusKind) -> Packet {
    PlayStatus { status }.into()
}

fn start_game(runtime_entity_id: u64) -> Packet {
    StartGame {
        runtime_entity_id,
        ..StartGame::default()
    }
    .into()
}

fn count_spawns(events: &mut broadcast::Receiver<ClientEvent>) -> usize {
    let mut spawns = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ClientEvent::Spawn) {
            spawns += 1;
        }
    }
    spawns
}

#[tokio::test]
async fn offline_join_reaches_spawn_once() {
    let mut server = TestServer::new();
    let (connection, mut events) = start_client(&server).await;

    let login = negotiate(&mut server).await;
    assert_eq!(login.protocol, 712);

    let chain: serde_json::Value = serde_json::from_str(&login.identity).unwrap();
    let chain = chain["chain"].as_array().unwrap();
    assert_eq!(chain.len(), 1);
    let (_, identity) = verify_token(chain[0].as_str().unwrap()).unwrap();
    assert_eq!(identity["extraData"]["displayName"], TEST_USERNAME);

    let (_, client) = verify_token(&login.client).unwrap();
    assert_eq!(client["ServerAddress"], "127.0.0.1:19132");
    assert_eq!(client["ThirdPartyName"], TEST_USERNAME);

    server.send(vec![status(PlayStatusKind::LoginSuccess)]).await;
    server.send(vec![ResourcePacksInfo::default().into()]).await;
    assert_eq!(server.expect().await, Packet::from(ResourcePackClientResponse::completed()));
    server.send(vec![ResourcePackStack::default().into()]).await;
    assert_eq!(server.expect().await, Packet::from(ResourcePackClientResponse::completed()));

    server.send(vec![start_game(42)]).await;
    assert_eq!(
        server.expect().await,
        Packet::from(RequestChunkRadius {
            radius: 10,
            max_radius: 10
        })
    );

    server.send(vec![status(PlayStatusKind::PlayerSpawn)]).await;
    assert_eq!(
        server.expect().await,
        Packet::from(SetLocalPlayerAsInitialized {
            runtime_entity_id: 42
        })
    );
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Spawn)).await;
    assert_eq!(connection.state(), SessionState::Spawned);

    // A repeated PlayerSpawn must not initialize again. Its packet event is
    // emitted before the session handles it, and disconnect queues behind.
    server.send(vec![status(PlayStatusKind::PlayerSpawn)]).await;
    wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::Packet(p) if matches!(**p, Packet::PlayStatus(_)))
    })
    .await;
    connection.disconnect().await.unwrap();

    assert_eq!(server.drain(), vec![Packet::from(Disconnect::normal())]);
    assert_eq!(count_spawns(&mut events), 0);
    assert_eq!(connection.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn join_without_encryption_challenge_spawns() {
    let mut server = TestServer::new();
    let (connection, mut events) = start_client(&server).await;

    assert_eq!(
        server.expect().await,
        Packet::from(RequestNetworkSettings { protocol: 712 })
    );
    server.send_network_settings(TEST_THRESHOLD).await;
    assert!(matches!(server.expect().await, Packet::Login(_)));

    server.send(vec![status(PlayStatusKind::LoginSuccess)]).await;
    server.send(vec![start_game(5)]).await;
    assert_eq!(
        server.expect().await,
        Packet::from(RequestChunkRadius {
            radius: 10,
            max_radius: 10
        })
    );

    server.send(vec![status(PlayStatusKind::PlayerSpawn)]).await;
    assert_eq!(
        server.expect().await,
        Packet::from(SetLocalPlayerAsInitialized {
            runtime_entity_id: 5
        })
    );
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Spawn)).await;
    assert_eq!(connection.state(), SessionState::Spawned);

    // Nothing was ever encrypted, so the goodbye is readable as-is.
    connection.disconnect().await.unwrap();
    assert_eq!(server.drain(), vec![Packet::from(Disconnect::normal())]);
}

#[tokio::test]
async fn spawn_before_start_game_is_deferred() {
    let mut server = TestServer::new();
    let (connection, mut events) = start_client(&server).await;
    negotiate(&mut server).await;

    server.send(vec![status(PlayStatusKind::LoginSuccess)]).await;
    server.send(vec![status(PlayStatusKind::PlayerSpawn)]).await;
    server.send(vec![start_game(7)]).await;

    assert!(matches!(server.expect().await, Packet::RequestChunkRadius(_)));
    assert_eq!(
        server.expect().await,
        Packet::from(SetLocalPlayerAsInitialized {
            runtime_entity_id: 7
        })
    );
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Spawn)).await;

    connection.disconnect().await.unwrap();
    assert_eq!(count_spawns(&mut events), 0);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let mut server = TestServer::new();
    let (connection, mut events) = start_client(&server).await;
    negotiate(&mut server).await;

    let (first, second) = tokio::join!(connection.disconnect(), connection.disconnect());
    first.unwrap();
    second.unwrap();
    connection.disconnect().await.unwrap();

    assert_eq!(server.drain(), vec![Packet::from(Disconnect::normal())]);
    assert_eq!(server.transport.close_calls(), 1);
    assert_eq!(connection.state(), SessionState::Disconnected);

    let reason = match wait_for_event(&mut events, |e| matches!(e, ClientEvent::Disconnected { .. })).await {
        ClientEvent::Disconnected { reason } => reason,
        _ => unreachable!(),
    };
    assert_eq!(reason, "client disconnect");
}

#[tokio::test]
async fn forged_challenge_ends_the_session() {
    let mut server = TestServer::new();
    let (connection, mut events) = start_client(&server).await;

    server.expect().await;
    server.send_network_settings(256).await;
    assert!(matches!(server.expect().await, Packet::Login(_)));

    server.send_challenge_token("eyJhbGciOiJub25lIn0.e30.c2ln".to_string()).await;
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Disconnected { .. })).await;
    connection.closed().await;

    assert!(server.transport.is_closed());
    // No handshake ack and no goodbye on a fatal failure.
    assert!(server.drain().is_empty());
}

#[tokio::test]
async fn server_disconnect_packet_closes_without_reply() {
    let mut server = TestServer::new();
    let (connection, mut events) = start_client(&server).await;
    negotiate(&mut server).await;

    server
        .send(vec![Disconnect {
            reason: 0,
            hide_screen: false,
            message: "kicked".to_string(),
            filtered_message: String::new(),
        }
        .into()])
        .await;

    let reason = match wait_for_event(&mut events, |e| matches!(e, ClientEvent::Disconnected { .. })).await {
        ClientEvent::Disconnected { reason } => reason,
        _ => unreachable!(),
    };
    assert_eq!(reason, "kicked");

    connection.disconnect().await.unwrap();
    assert!(server.drain().is_empty());
    assert_eq!(server.transport.close_calls(), 1);
}

#[tokio::test]
async fn disconnect_before_connect_sends_nothing() {
    let mut server = TestServer::new();
    let connection = Connection::new(
        ClientOptions::default(),
        server.transport(),
        Arc::new(OfflineIdentity::new(TEST_USERNAME)),
    )
    .unwrap();

    connection.disconnect().await.unwrap();
    assert!(server.drain().is_empty());
    assert_eq!(server.transport.close_calls(), 0);
    assert!(connection.connect().await.is_err());
}
