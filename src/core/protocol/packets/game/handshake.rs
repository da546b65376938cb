//! Packets exchanged before the player is in the world.

use crate::core::protocol::error::CodecError;
use crate::core::protocol::packets::game::packet::GamePacket;
use crate::core::protocol::packets::stream::{PacketReader, PacketWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestNetworkSettings {
    pub protocol: i32,
}

impl GamePacket for RequestNetworkSettings {
    const ID: u32 = 193;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.i32_be(self.protocol);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            protocol: r.i32_be()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub compression_threshold: u16,
    pub compression_method: u16,
    pub client_throttle: bool,
    pub throttle_threshold: u8,
    pub throttle_scalar: f32,
}

impl GamePacket for NetworkSettings {
    const ID: u32 = 143;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.u16_le(self.compression_threshold)
            .u16_le(self.compression_method)
            .bool(self.client_throttle)
            .u8(self.throttle_threshold)
            .f32_le(self.throttle_scalar);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            compression_threshold: r.u16_le()?,
            compression_method: r.u16_le()?,
            client_throttle: r.bool()?,
            throttle_threshold: r.u8()?,
            throttle_scalar: r.f32_le()?,
        })
    }
}

/// Login request. `identity` is the JSON `{"chain":[..]}` wrapper, `client`
/// the signed user chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub protocol: i32,
    pub identity: String,
    pub client: String,
}

impl GamePacket for Login {
    const ID: u32 = 1;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        let mut tokens = PacketWriter::new();
        tokens.string_i32_le(&self.identity).string_i32_le(&self.client);
        let tokens = tokens.finish();

        let len = u32::try_from(tokens.len()).map_err(|_| CodecError::MalformedPacket {
            id: Self::ID,
            details: "token blob too large".to_string(),
        })?;
        w.i32_be(self.protocol).var_u32(len).bytes(&tokens);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        let protocol = r.i32_be()?;
        let len = r.var_u32()? as usize;
        let mut tokens = PacketReader::new(r.bytes(len)?);
        Ok(Self {
            protocol,
            identity: tokens.string_i32_le()?,
            client: tokens.string_i32_le()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatusKind {
    LoginSuccess,
    FailedClient,
    FailedServer,
    PlayerSpawn,
    FailedInvalidTenant,
    FailedVanillaEdu,
    FailedEduVanilla,
    FailedServerFull,
    FailedEditorVanillaMismatch,
    FailedVanillaEditorMismatch,
    Unknown(i32),
}

impl PlayStatusKind {
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => PlayStatusKind::LoginSuccess,
            1 => PlayStatusKind::FailedClient,
            2 => PlayStatusKind::FailedServer,
            3 => PlayStatusKind::PlayerSpawn,
            4 => PlayStatusKind::FailedInvalidTenant,
            5 => PlayStatusKind::FailedVanillaEdu,
            6 => PlayStatusKind::FailedEduVanilla,
            7 => PlayStatusKind::FailedServerFull,
            8 => PlayStatusKind::FailedEditorVanillaMismatch,
            9 => PlayStatusKind::FailedVanillaEditorMismatch,
            other => PlayStatusKind::Unknown(other),
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            PlayStatusKind::LoginSuccess => 0,
            PlayStatusKind::FailedClient => 1,
            PlayStatusKind::FailedServer => 2,
            PlayStatusKind::PlayerSpawn => 3,
            PlayStatusKind::FailedInvalidTenant => 4,
            PlayStatusKind::FailedVanillaEdu => 5,
            PlayStatusKind::FailedEduVanilla => 6,
            PlayStatusKind::FailedServerFull => 7,
            PlayStatusKind::FailedEditorVanillaMismatch => 8,
            PlayStatusKind::FailedVanillaEditorMismatch => 9,
            PlayStatusKind::Unknown(other) => other,
        }
    }

    pub fn is_failure(self) -> bool {
        !matches!(
            self,
            PlayStatusKind::LoginSuccess | PlayStatusKind::PlayerSpawn
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayStatus {
    pub status: PlayStatusKind,
}

impl GamePacket for PlayStatus {
    const ID: u32 = 2;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.i32_be(self.status.as_i32());
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            status: PlayStatusKind::from_i32(r.i32_be()?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerToClientHandshake {
    pub token: String,
}

impl GamePacket for ServerToClientHandshake {
    const ID: u32 = 3;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.string(&self.token);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self { token: r.string()? })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientToServerHandshake;

impl GamePacket for ClientToServerHandshake {
    const ID: u32 = 4;

    fn encode(&self, _: &mut PacketWriter) -> Result<(), CodecError> {
        Ok(())
    }

    fn decode(_: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self)
    }
}

/// Reason code used for a plain client-initiated disconnect.
pub const DISCONNECT_REASON_UNKNOWN: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: i32,
    pub hide_screen: bool,
    pub message: String,
    pub filtered_message: String,
}

impl Disconnect {
    pub fn normal() -> Self {
        Self {
            reason: DISCONNECT_REASON_UNKNOWN,
            hide_screen: true,
            message: String::new(),
            filtered_message: String::new(),
        }
    }
}

impl GamePacket for Disconnect {
    const ID: u32 = 5;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.var_i32(self.reason).bool(self.hide_screen);
        if !self.hide_screen {
            w.string(&self.message).string(&self.filtered_message);
        }
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        let reason = r.var_i32()?;
        let hide_screen = r.bool()?;
        let (message, filtered_message) = if hide_screen {
            (String::new(), String::new())
        } else {
            let message = r.string()?;
            // Older servers stop after the message.
            let filtered = if r.remaining() > 0 { r.string()? } else { String::new() };
            (message, filtered)
        };
        Ok(Self {
            reason,
            hide_screen,
            message,
            filtered_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reencode<P: GamePacket>(p: &P) -> P {
        let mut w = PacketWriter::new();
        p.encode(&mut w).unwrap();
        P::decode(&mut PacketReader::new(w.finish())).unwrap()
    }

    #[test]
    fn request_network_settings_is_big_endian() {
        let mut w = PacketWriter::new();
        RequestNetworkSettings { protocol: 712 }.encode(&mut w).unwrap();
        assert_eq!(&w.finish()[..], &[0, 0, 0x02, 0xC8]);
    }

    #[test]
    fn login_wraps_tokens_in_a_length_prefixed_blob() {
        let login = Login {
            protocol: 712,
            identity: r#"{"chain":["a.b.c"]}"#.into(),
            client: "d.e.f".into(),
        };
        let mut w = PacketWriter::new();
        login.encode(&mut w).unwrap();
        let bytes = w.finish();
        // protocol (4) + varint length (1) + (4 + 19) + (4 + 5)
        assert_eq!(bytes.len(), 4 + 1 + 23 + 9);
        assert_eq!(bytes[4] as usize, 32);
        assert_eq!(reencode(&login), login);
    }

    #[test]
    fn play_status_failures() {
        assert!(PlayStatusKind::from_i32(7).is_failure());
        assert!(!PlayStatusKind::from_i32(3).is_failure());
        assert_eq!(PlayStatusKind::from_i32(42), PlayStatusKind::Unknown(42));
    }

    #[test]
    fn hidden_disconnect_has_no_message() {
        let mut w = PacketWriter::new();
        Disconnect::normal().encode(&mut w).unwrap();
        assert_eq!(&w.finish()[..], &[0, 1]);

        let shown = Disconnect {
            reason: 3,
            hide_screen: false,
            message: "bye".into(),
            filtered_message: String::new(),
        };
        assert_eq!(reencode(&shown), shown);
    }

    #[test]
    fn disconnect_without_filtered_message() {
        let mut w = PacketWriter::new();
        w.var_i32(0).bool(false).string("kicked");
        let d = Disconnect::decode(&mut PacketReader::new(w.finish())).unwrap();
        assert_eq!(d.message, "kicked");
        assert!(d.filtered_message.is_empty());
    }
}
