use crate::core::protocol::error::CodecError;
use crate::core::protocol::packets::game::packet::GamePacket;
use crate::core::protocol::packets::stream::{PacketReader, PacketWriter};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Only the leading fields are decoded; the remainder of the packet (level
/// settings, item tables, ...) is not needed to join and is skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartGame {
    pub entity_id: i64,
    pub runtime_entity_id: u64,
    pub gamemode: i32,
    pub position: Vec3,
    pub rotation: Vec2,
}

impl GamePacket for StartGame {
    const ID: u32 = 11;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.var_i64(self.entity_id)
            .var_u64(self.runtime_entity_id)
            .var_i32(self.gamemode)
            .f32_le(self.position.x)
            .f32_le(self.position.y)
            .f32_le(self.position.z)
            .f32_le(self.rotation.x)
            .f32_le(self.rotation.y);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            entity_id: r.var_i64()?,
            runtime_entity_id: r.var_u64()?,
            gamemode: r.var_i32()?,
            position: Vec3 {
                x: r.f32_le()?,
                y: r.f32_le()?,
                z: r.f32_le()?,
            },
            rotation: Vec2 {
                x: r.f32_le()?,
                y: r.f32_le()?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestChunkRadius {
    pub radius: i32,
    pub max_radius: u8,
}

impl GamePacket for RequestChunkRadius {
    const ID: u32 = 69;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.var_i32(self.radius).u8(self.max_radius);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            radius: r.var_i32()?,
            max_radius: r.u8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRadiusUpdate {
    pub radius: i32,
}

impl GamePacket for ChunkRadiusUpdate {
    const ID: u32 = 70;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.var_i32(self.radius);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            radius: r.var_i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLocalPlayerAsInitialized {
    pub runtime_entity_id: u64,
}

impl GamePacket for SetLocalPlayerAsInitialized {
    const ID: u32 = 113;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.var_u64(self.runtime_entity_id);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            runtime_entity_id: r.var_u64()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Raw,
    Chat,
    Translation,
    Popup,
    JukeboxPopup,
    Tip,
    System,
    Whisper,
    Announcement,
    JsonWhisper,
    Json,
    JsonAnnouncement,
}

impl TextKind {
    fn from_u8(value: u8) -> Result<Self, CodecError> {
        Ok(match value {
            0 => TextKind::Raw,
            1 => TextKind::Chat,
            2 => TextKind::Translation,
            3 => TextKind::Popup,
            4 => TextKind::JukeboxPopup,
            5 => TextKind::Tip,
            6 => TextKind::System,
            7 => TextKind::Whisper,
            8 => TextKind::Announcement,
            9 => TextKind::JsonWhisper,
            10 => TextKind::Json,
            11 => TextKind::JsonAnnouncement,
            other => {
                return Err(CodecError::MalformedPacket {
                    id: Text::ID,
                    details: format!("unknown text type {}", other),
                })
            }
        })
    }

    fn as_u8(self) -> u8 {
        self as u8
    }

    fn has_source(self) -> bool {
        matches!(self, TextKind::Chat | TextKind::Whisper | TextKind::Announcement)
    }

    fn has_parameters(self) -> bool {
        matches!(self, TextKind::Translation | TextKind::Popup | TextKind::JukeboxPopup)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub kind: TextKind,
    pub needs_translation: bool,
    pub source_name: String,
    pub message: String,
    pub parameters: Vec<String>,
    pub xuid: String,
    pub platform_chat_id: String,
    pub filtered_message: String,
}

impl Text {
    /// Renders the line the way it would show up in the chat window.
    pub fn display(&self) -> String {
        let announcement = self.message.contains("%chat.type.announcement");
        match self.kind {
            TextKind::Translation if (announcement || self.message == "chat.type.text") => {
                match (self.parameters.first(), self.parameters.get(1)) {
                    (Some(who), Some(what)) => format!("[{}] {}", who, what),
                    _ => self.message.clone(),
                }
            }
            _ if self.kind.has_source() && !self.source_name.is_empty() => {
                format!("<{}> {}", self.source_name, self.message)
            }
            _ => self.message.clone(),
        }
    }
}

impl GamePacket for Text {
    const ID: u32 = 9;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.u8(self.kind.as_u8()).bool(self.needs_translation);
        if self.kind.has_source() {
            w.string(&self.source_name);
        }
        w.string(&self.message);
        if self.kind.has_parameters() {
            w.var_u32(self.parameters.len() as u32);
            for p in &self.parameters {
                w.string(p);
            }
        }
        w.string(&self.xuid)
            .string(&self.platform_chat_id)
            .string(&self.filtered_message);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        let kind = TextKind::from_u8(r.u8()?)?;
        let needs_translation = r.bool()?;
        let source_name = if kind.has_source() { r.string()? } else { String::new() };
        let message = r.string()?;
        let parameters = if kind.has_parameters() {
            let count = r.var_u32()?;
            (0..count).map(|_| r.string()).collect::<Result<_, _>>()?
        } else {
            Vec::new()
        };
        let xuid = r.string()?;
        let platform_chat_id = r.string()?;
        let filtered_message = if r.remaining() > 0 { r.string()? } else { String::new() };
        Ok(Self {
            kind,
            needs_translation,
            source_name,
            message,
            parameters,
            xuid,
            platform_chat_id,
            filtered_message,
        })
    }
}
