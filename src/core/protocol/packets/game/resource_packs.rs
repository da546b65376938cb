use crate::core::protocol::error::CodecError;
use crate::core::protocol::packets::game::packet::GamePacket;
use crate::core::protocol::packets::stream::{PacketReader, PacketWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackInfoEntry {
    pub uuid: String,
    pub version: String,
    pub size: u64,
    pub content_key: String,
    pub sub_pack_name: String,
    pub content_identity: String,
    pub has_scripts: bool,
    pub is_addon: bool,
    pub rtx_enabled: bool,
}

impl PackInfoEntry {
    fn encode(&self, w: &mut PacketWriter) {
        w.string(&self.uuid)
            .string(&self.version)
            .u64_le(self.size)
            .string(&self.content_key)
            .string(&self.sub_pack_name)
            .string(&self.content_identity)
            .bool(self.has_scripts)
            .bool(self.is_addon)
            .bool(self.rtx_enabled);
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        Ok(Self {
            uuid: r.string()?,
            version: r.string()?,
            size: r.u64_le()?,
            content_key: r.string()?,
            sub_pack_name: r.string()?,
            content_identity: r.string()?,
            has_scripts: r.bool()?,
            is_addon: r.bool()?,
            rtx_enabled: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePacksInfo {
    pub must_accept: bool,
    pub has_addons: bool,
    pub has_scripts: bool,
    pub texture_packs: Vec<PackInfoEntry>,
}

impl GamePacket for ResourcePacksInfo {
    const ID: u32 = 6;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        let count = u16::try_from(self.texture_packs.len()).map_err(|_| CodecError::MalformedPacket {
            id: Self::ID,
            details: "too many packs".to_string(),
        })?;
        w.bool(self.must_accept)
            .bool(self.has_addons)
            .bool(self.has_scripts)
            .u16_le(count);
        for pack in &self.texture_packs {
            pack.encode(w);
        }
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        let must_accept = r.bool()?;
        let has_addons = r.bool()?;
        let has_scripts = r.bool()?;
        let count = r.u16_le()?;
        let texture_packs = (0..count)
            .map(|_| PackInfoEntry::decode(r))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            must_accept,
            has_addons,
            has_scripts,
            texture_packs,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEntry {
    pub uuid: String,
    pub version: String,
    pub sub_pack_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePackStack {
    pub must_accept: bool,
    pub behavior_packs: Vec<StackEntry>,
    pub texture_packs: Vec<StackEntry>,
    pub game_version: String,
    pub experiments: Vec<Experiment>,
    pub experiments_previously_toggled: bool,
    pub has_editor_packs: bool,
}

fn write_stack(w: &mut PacketWriter, entries: &[StackEntry]) {
    w.var_u32(entries.len() as u32);
    for e in entries {
        w.string(&e.uuid).string(&e.version).string(&e.sub_pack_name);
    }
}

fn read_stack(r: &mut PacketReader) -> Result<Vec<StackEntry>, CodecError> {
    let count = r.var_u32()?;
    (0..count)
        .map(|_| {
            Ok(StackEntry {
                uuid: r.string()?,
                version: r.string()?,
                sub_pack_name: r.string()?,
            })
        })
        .collect()
}

impl GamePacket for ResourcePackStack {
    const ID: u32 = 7;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.bool(self.must_accept);
        write_stack(w, &self.behavior_packs);
        write_stack(w, &self.texture_packs);
        w.string(&self.game_version)
            .i32_le(self.experiments.len() as i32);
        for e in &self.experiments {
            w.string(&e.name).bool(e.enabled);
        }
        w.bool(self.experiments_previously_toggled)
            .bool(self.has_editor_packs);
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        let must_accept = r.bool()?;
        let behavior_packs = read_stack(r)?;
        let texture_packs = read_stack(r)?;
        let game_version = r.string()?;
        let count = r.i32_le()?;
        if count < 0 {
            return Err(CodecError::MalformedPacket {
                id: Self::ID,
                details: format!("negative experiment count {}", count),
            });
        }
        let experiments = (0..count)
            .map(|_| {
                Ok(Experiment {
                    name: r.string()?,
                    enabled: r.bool()?,
                })
            })
            .collect::<Result<_, CodecError>>()?;
        Ok(Self {
            must_accept,
            behavior_packs,
            texture_packs,
            game_version,
            experiments,
            experiments_previously_toggled: r.bool()?,
            has_editor_packs: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackResponse {
    None,
    Refused,
    SendPacks,
    HaveAllPacks,
    Completed,
}

impl PackResponse {
    fn as_u8(self) -> u8 {
        match self {
            PackResponse::None => 0,
            PackResponse::Refused => 1,
            PackResponse::SendPacks => 2,
            PackResponse::HaveAllPacks => 3,
            PackResponse::Completed => 4,
        }
    }

    fn from_u8(value: u8) -> Result<Self, CodecError> {
        Ok(match value {
            0 => PackResponse::None,
            1 => PackResponse::Refused,
            2 => PackResponse::SendPacks,
            3 => PackResponse::HaveAllPacks,
            4 => PackResponse::Completed,
            other => {
                return Err(CodecError::MalformedPacket {
                    id: ResourcePackClientResponse::ID,
                    details: format!("unknown response {}", other),
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePackClientResponse {
    pub response: PackResponse,
    pub packs: Vec<String>,
}

impl ResourcePackClientResponse {
    /// "Done, nothing to download."
    pub fn completed() -> Self {
        Self {
            response: PackResponse::Completed,
            packs: Vec::new(),
        }
    }
}

impl GamePacket for ResourcePackClientResponse {
    const ID: u32 = 8;

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.u8(self.response.as_u8()).u16_le(self.packs.len() as u16);
        for id in &self.packs {
            w.string(id);
        }
        Ok(())
    }

    fn decode(r: &mut PacketReader) -> Result<Self, CodecError> {
        let response = PackResponse::from_u8(r.u8()?)?;
        let count = r.u16_le()?;
        let packs = (0..count).map(|_| r.string()).collect::<Result<_, _>>()?;
        Ok(Self { response, packs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_response_layout() {
        let mut w = PacketWriter::new();
        ResourcePackClientResponse::completed().encode(&mut w).unwrap();
        assert_eq!(&w.finish()[..], &[4, 0, 0]);
    }

    #[test]
    fn info_with_packs_survives_reencoding() {
        let info = ResourcePacksInfo {
            must_accept: true,
            texture_packs: vec![PackInfoEntry {
                uuid: "0fba4063-dba1-4281-9b89-ff9390653530".into(),
                version: "1.0.0".into(),
                size: 1024,
                content_key: String::new(),
                sub_pack_name: String::new(),
                content_identity: String::new(),
                has_scripts: false,
                is_addon: false,
                rtx_enabled: false,
            }],
            ..Default::default()
        };
        let mut w = PacketWriter::new();
        info.encode(&mut w).unwrap();
        let decoded = ResourcePacksInfo::decode(&mut PacketReader::new(w.finish())).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn truncated_stack_fails() {
        let mut w = PacketWriter::new();
        w.bool(false).var_u32(1).string("only-uuid");
        assert!(ResourcePackStack::decode(&mut PacketReader::new(w.finish())).is_err());
    }
}
