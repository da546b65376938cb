use bytes::Bytes;

use crate::core::protocol::error::CodecError;
use crate::core::protocol::packets::game::handshake::{
    ClientToServerHandshake, Disconnect, Login, NetworkSettings, PlayStatus, RequestNetworkSettings,
    ServerToClientHandshake,
};
use crate::core::protocol::packets::game::resource_packs::{
    ResourcePackClientResponse, ResourcePackStack, ResourcePacksInfo,
};
use crate::core::protocol::packets::game::world::{
    ChunkRadiusUpdate, RequestChunkRadius, SetLocalPlayerAsInitialized, StartGame, Text,
};
use crate::core::protocol::packets::stream::{PacketReader, PacketWriter};

/// Low ten bits of the header varint carry the packet id; the rest are
/// split-screen sub-client ids which this client ignores.
pub const PACKET_ID_MASK: u32 = 0x3FF;

/// Hand-written wire codec of one packet body.
pub trait GamePacket: Sized {
    const ID: u32;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError>;

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    RequestNetworkSettings,
    NetworkSettings,
    Login,
    PlayStatus,
    ServerToClientHandshake,
    ClientToServerHandshake,
    Disconnect,
    ResourcePacksInfo,
    ResourcePackStack,
    ResourcePackClientResponse,
    Text,
    StartGame,
    RequestChunkRadius,
    ChunkRadiusUpdate,
    SetLocalPlayerAsInitialized,
    /// A packet kept as an opaque body, keyed by its id.
    Raw(u32),
}

impl PacketKind {
    pub fn id(self) -> u32 {
        match self {
            PacketKind::RequestNetworkSettings => RequestNetworkSettings::ID,
            PacketKind::NetworkSettings => NetworkSettings::ID,
            PacketKind::Login => Login::ID,
            PacketKind::PlayStatus => PlayStatus::ID,
            PacketKind::ServerToClientHandshake => ServerToClientHandshake::ID,
            PacketKind::ClientToServerHandshake => ClientToServerHandshake::ID,
            PacketKind::Disconnect => Disconnect::ID,
            PacketKind::ResourcePacksInfo => ResourcePacksInfo::ID,
            PacketKind::ResourcePackStack => ResourcePackStack::ID,
            PacketKind::ResourcePackClientResponse => ResourcePackClientResponse::ID,
            PacketKind::Text => Text::ID,
            PacketKind::StartGame => StartGame::ID,
            PacketKind::RequestChunkRadius => RequestChunkRadius::ID,
            PacketKind::ChunkRadiusUpdate => ChunkRadiusUpdate::ID,
            PacketKind::SetLocalPlayerAsInitialized => SetLocalPlayerAsInitialized::ID,
            PacketKind::Raw(id) => id,
        }
    }

    pub const KNOWN: [PacketKind; 15] = [
        PacketKind::RequestNetworkSettings,
        PacketKind::NetworkSettings,
        PacketKind::Login,
        PacketKind::PlayStatus,
        PacketKind::ServerToClientHandshake,
        PacketKind::ClientToServerHandshake,
        PacketKind::Disconnect,
        PacketKind::ResourcePacksInfo,
        PacketKind::ResourcePackStack,
        PacketKind::ResourcePackClientResponse,
        PacketKind::Text,
        PacketKind::StartGame,
        PacketKind::RequestChunkRadius,
        PacketKind::ChunkRadiusUpdate,
        PacketKind::SetLocalPlayerAsInitialized,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    RequestNetworkSettings(RequestNetworkSettings),
    NetworkSettings(NetworkSettings),
    Login(Login),
    PlayStatus(PlayStatus),
    ServerToClientHandshake(ServerToClientHandshake),
    ClientToServerHandshake(ClientToServerHandshake),
    Disconnect(Disconnect),
    ResourcePacksInfo(ResourcePacksInfo),
    ResourcePackStack(ResourcePackStack),
    ResourcePackClientResponse(ResourcePackClientResponse),
    Text(Text),
    StartGame(StartGame),
    RequestChunkRadius(RequestChunkRadius),
    ChunkRadiusUpdate(ChunkRadiusUpdate),
    SetLocalPlayerAsInitialized(SetLocalPlayerAsInitialized),
    Raw { id: u32, body: Bytes },
}

macro_rules! packet_from {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<$name> for Packet {
                fn from(p: $name) -> Self {
                    Packet::$name(p)
                }
            }
        )*
    };
}

packet_from!(
    RequestNetworkSettings,
    NetworkSettings,
    Login,
    PlayStatus,
    ServerToClientHandshake,
    ClientToServerHandshake,
    Disconnect,
    ResourcePacksInfo,
    ResourcePackStack,
    ResourcePackClientResponse,
    Text,
    StartGame,
    RequestChunkRadius,
    ChunkRadiusUpdate,
    SetLocalPlayerAsInitialized,
);

fn decode_body<P: GamePacket>(body: Bytes) -> Result<P, CodecError> {
    let mut r = PacketReader::new(body);
    P::decode(&mut r)
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::RequestNetworkSettings(_) => PacketKind::RequestNetworkSettings,
            Packet::NetworkSettings(_) => PacketKind::NetworkSettings,
            Packet::Login(_) => PacketKind::Login,
            Packet::PlayStatus(_) => PacketKind::PlayStatus,
            Packet::ServerToClientHandshake(_) => PacketKind::ServerToClientHandshake,
            Packet::ClientToServerHandshake(_) => PacketKind::ClientToServerHandshake,
            Packet::Disconnect(_) => PacketKind::Disconnect,
            Packet::ResourcePacksInfo(_) => PacketKind::ResourcePacksInfo,
            Packet::ResourcePackStack(_) => PacketKind::ResourcePackStack,
            Packet::ResourcePackClientResponse(_) => PacketKind::ResourcePackClientResponse,
            Packet::Text(_) => PacketKind::Text,
            Packet::StartGame(_) => PacketKind::StartGame,
            Packet::RequestChunkRadius(_) => PacketKind::RequestChunkRadius,
            Packet::ChunkRadiusUpdate(_) => PacketKind::ChunkRadiusUpdate,
            Packet::SetLocalPlayerAsInitialized(_) => PacketKind::SetLocalPlayerAsInitialized,
            Packet::Raw { id, .. } => PacketKind::Raw(*id),
        }
    }

    pub fn id(&self) -> u32 {
        self.kind().id()
    }

    /// Header varint followed by the body.
    pub fn serialize(&self) -> Result<Bytes, CodecError> {
        let mut w = PacketWriter::new();
        w.var_u32(self.id());
        match self {
            Packet::RequestNetworkSettings(p) => p.encode(&mut w)?,
            Packet::NetworkSettings(p) => p.encode(&mut w)?,
            Packet::Login(p) => p.encode(&mut w)?,
            Packet::PlayStatus(p) => p.encode(&mut w)?,
            Packet::ServerToClientHandshake(p) => p.encode(&mut w)?,
            Packet::ClientToServerHandshake(p) => p.encode(&mut w)?,
            Packet::Disconnect(p) => p.encode(&mut w)?,
            Packet::ResourcePacksInfo(p) => p.encode(&mut w)?,
            Packet::ResourcePackStack(p) => p.encode(&mut w)?,
            Packet::ResourcePackClientResponse(p) => p.encode(&mut w)?,
            Packet::Text(p) => p.encode(&mut w)?,
            Packet::StartGame(p) => p.encode(&mut w)?,
            Packet::RequestChunkRadius(p) => p.encode(&mut w)?,
            Packet::ChunkRadiusUpdate(p) => p.encode(&mut w)?,
            Packet::SetLocalPlayerAsInitialized(p) => p.encode(&mut w)?,
            Packet::Raw { body, .. } => {
                w.bytes(body);
            }
        }
        Ok(w.finish())
    }

    /// Decodes the body of a known kind. `body` starts after the header varint.
    pub fn deserialize(kind: PacketKind, body: Bytes) -> Result<Packet, CodecError> {
        Ok(match kind {
            PacketKind::RequestNetworkSettings => Packet::RequestNetworkSettings(decode_body(body)?),
            PacketKind::NetworkSettings => Packet::NetworkSettings(decode_body(body)?),
            PacketKind::Login => Packet::Login(decode_body(body)?),
            PacketKind::PlayStatus => Packet::PlayStatus(decode_body(body)?),
            PacketKind::ServerToClientHandshake => Packet::ServerToClientHandshake(decode_body(body)?),
            PacketKind::ClientToServerHandshake => Packet::ClientToServerHandshake(decode_body(body)?),
            PacketKind::Disconnect => Packet::Disconnect(decode_body(body)?),
            PacketKind::ResourcePacksInfo => Packet::ResourcePacksInfo(decode_body(body)?),
            PacketKind::ResourcePackStack => Packet::ResourcePackStack(decode_body(body)?),
            PacketKind::ResourcePackClientResponse => {
                Packet::ResourcePackClientResponse(decode_body(body)?)
            }
            PacketKind::Text => Packet::Text(decode_body(body)?),
            PacketKind::StartGame => Packet::StartGame(decode_body(body)?),
            PacketKind::RequestChunkRadius => Packet::RequestChunkRadius(decode_body(body)?),
            PacketKind::ChunkRadiusUpdate => Packet::ChunkRadiusUpdate(decode_body(body)?),
            PacketKind::SetLocalPlayerAsInitialized => {
                Packet::SetLocalPlayerAsInitialized(decode_body(body)?)
            }
            PacketKind::Raw(id) => Packet::Raw { id, body },
        })
    }
}

/// Splits a frame into its packet id and body.
pub fn split_header(frame: Bytes) -> Result<(u32, Bytes), CodecError> {
    let mut r = PacketReader::new(frame);
    let header = r.var_u32()?;
    Ok((header & PACKET_ID_MASK, r.rest()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_the_id() {
        let bytes = Packet::from(RequestChunkRadius {
            radius: 10,
            max_radius: 10,
        })
        .serialize()
        .unwrap();
        let (id, body) = split_header(bytes).unwrap();
        assert_eq!(id, 69);
        let decoded = Packet::deserialize(PacketKind::RequestChunkRadius, body).unwrap();
        assert_eq!(
            decoded,
            Packet::RequestChunkRadius(RequestChunkRadius {
                radius: 10,
                max_radius: 10
            })
        );
    }

    #[test]
    fn sub_client_bits_are_masked() {
        // id 2 with sender sub-client 1 (bits 10..12)
        let mut w = PacketWriter::new();
        w.var_u32(2 | (1 << 10)).i32_be(3);
        let (id, _) = split_header(w.finish()).unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn raw_packets_keep_their_body() {
        let packet = Packet::Raw {
            id: 39,
            body: Bytes::from_static(&[1, 2, 3]),
        };
        let bytes = packet.serialize().unwrap();
        assert_eq!(&bytes[..], &[39, 1, 2, 3]);
        assert_eq!(packet.kind(), PacketKind::Raw(39));
    }

    #[test]
    fn known_kinds_have_distinct_ids() {
        let mut ids: Vec<u32> = PacketKind::KNOWN.iter().map(|k| k.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), PacketKind::KNOWN.len());
    }
}
