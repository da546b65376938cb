use tracing::{debug, error, info, warn};

use crate::core::protocol::client::connection::SessionDriver;
use crate::core::protocol::client::events::ClientEvent;
use crate::core::protocol::client::session::SessionState;
use crate::core::protocol::crypto::handshake::handshake::complete_handshake;
use crate::core::protocol::error::{ProtocolError, ProtocolResult};
use crate::core::protocol::packets::compression::CompressionMethod;
use crate::core::protocol::packets::game::handshake::{
    ClientToServerHandshake, Login, NetworkSettings, PlayStatusKind,
};
use crate::core::protocol::packets::game::packet::Packet;
use crate::core::protocol::packets::game::resource_packs::ResourcePackClientResponse;
use crate::core::protocol::packets::game::world::{RequestChunkRadius, SetLocalPlayerAsInitialized, StartGame};

impl SessionDriver {
    /// Internal handlers that walk the join sequence. Out-of-order packets
    /// are tolerated; only key and identity failures are fatal.
    pub(super) async fn handle_packet(&mut self, packet: &Packet) -> ProtocolResult<()> {
        match packet {
            Packet::NetworkSettings(settings) => self.on_network_settings(settings).await,
            Packet::ServerToClientHandshake(handshake) => self.on_server_handshake(&handshake.token).await,
            Packet::PlayStatus(status) => {
                self.on_play_status(status.status).await;
                Ok(())
            }
            Packet::ResourcePacksInfo(info) => {
                if !info.texture_packs.is_empty() {
                    warn!("Server lists {} resource pack(s); downloads are not supported", info.texture_packs.len());
                }
                self.reply(ResourcePackClientResponse::completed().into()).await;
                Ok(())
            }
            Packet::ResourcePackStack(stack) => {
                if !stack.texture_packs.is_empty() || !stack.behavior_packs.is_empty() {
                    warn!("Resource pack stack is not empty; downloads are not supported");
                }
                self.reply(ResourcePackClientResponse::completed().into()).await;
                Ok(())
            }
            Packet::StartGame(start) => {
                self.on_start_game(start).await;
                Ok(())
            }
            Packet::Text(text) => {
                info!(target: "chat", "{}", text.display());
                Ok(())
            }
            Packet::ChunkRadiusUpdate(update) => {
                debug!("Chunk radius set to {}", update.radius);
                Ok(())
            }
            Packet::Disconnect(disconnect) => {
                let reason = if disconnect.message.is_empty() {
                    format!("disconnected by server (reason {})", disconnect.reason)
                } else {
                    disconnect.message.clone()
                };
                self.shutdown(&reason, false).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn on_network_settings(&mut self, settings: &NetworkSettings) -> ProtocolResult<()> {
        debug!("S -> C NetworkSettings (threshold {})", settings.compression_threshold);

        let method = CompressionMethod::from_settings_id(settings.compression_method);
        if method != CompressionMethod::Zlib {
            warn!("Server asked for {:?} compression; batches will still be deflated", method);
        }
        self.pipeline.arm_compression(settings.compression_threshold);
        self.session.compression_threshold = Some(settings.compression_threshold);

        let identity = match self.identity_task.take() {
            Some(task) => task.await.map_err(|e| ProtocolError::AuthenticationFailed {
                reason: e.to_string(),
            })?,
            None => self.identity.authenticate().await,
        }
        .map_err(|e| match e {
            ProtocolError::AuthenticationFailed { .. } => e,
            other => ProtocolError::AuthenticationFailed {
                reason: other.to_string(),
            },
        })?;

        if self.options.offline != identity.is_offline() {
            debug!(
                "Identity provider returned a {} session",
                if identity.is_offline() { "offline" } else { "online" }
            );
        }

        let tokens = self.credentials.login_tokens(
            &identity,
            self.options.mojang_key.as_deref(),
            &self.options.skin_data,
        )?;

        let login = Login {
            protocol: self.session.protocol,
            identity: tokens.identity,
            client: tokens.client,
        };
        info!("Logging in as {}", identity.profile.name);
        self.set_state(SessionState::AwaitingLogin);
        self.reply(login.into()).await;
        Ok(())
    }

    async fn on_server_handshake(&mut self, token: &str) -> ProtocolResult<()> {
        debug!("S -> C ServerToClientHandshake");
        let compression = self.pipeline.effective_compression();
        let encryptor = complete_handshake(&mut self.key_exchange, token, compression)?;

        // The acknowledgement already travels encrypted.
        self.pipeline.arm_encryption(encryptor);
        self.reply(ClientToServerHandshake.into()).await;
        Ok(())
    }

    async fn on_play_status(&mut self, status: PlayStatusKind) {
        self.session.play_status = Some(status);
        match status {
            PlayStatusKind::LoginSuccess => {
                info!("Login accepted");
                self.set_state(SessionState::AwaitingStartGame);
            }
            PlayStatusKind::PlayerSpawn => {
                if self.session.runtime_entity_id.is_some() {
                    self.complete_spawn().await;
                } else {
                    debug!("PlayerSpawn before StartGame, deferring");
                    self.session.spawn_pending = true;
                }
            }
            failure => {
                error!("Play status {:?}; expecting the server to disconnect", failure);
            }
        }
    }

    async fn on_start_game(&mut self, start: &StartGame) {
        info!(
            "StartGame: runtime id {}, spawn at ({:.1}, {:.1}, {:.1})",
            start.runtime_entity_id, start.position.x, start.position.y, start.position.z
        );
        self.session.runtime_entity_id = Some(start.runtime_entity_id);
        self.session.position = start.position;

        let radius = self.options.view_distance;
        let request = RequestChunkRadius {
            radius,
            max_radius: u8::try_from(radius).unwrap_or(u8::MAX),
        };
        self.reply(request.into()).await;

        if self.session.spawn_pending {
            self.complete_spawn().await;
        }
    }

    async fn complete_spawn(&mut self) {
        self.session.spawn_pending = false;
        if self.session.spawn_emitted {
            return;
        }
        let runtime_entity_id = self.session.runtime_entity_id.unwrap_or_default();
        self.reply(SetLocalPlayerAsInitialized { runtime_entity_id }.into()).await;

        self.session.spawn_emitted = true;
        self.set_state(SessionState::Spawned);
        info!("✅ Spawned");
        self.emit(ClientEvent::Spawn);
    }
}
