use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tracing::trace;

use crate::core::protocol::error::CodecError;
use crate::core::protocol::packets::game::packet::{split_header, PacketKind};

/// Protocol the built-in override data was written against.
pub const OVERRIDES_PROTOCOL: i32 = 712;

/// Ids whose stock definitions are wrong or missing for protocol 712. They are
/// handed to listeners as opaque bodies.
pub const OVERRIDE_IDS_712: [u32; 18] = [
    13, 15, 39, 42, 43, 52, 60, 65, 72, 111, 124, 160, 162, 165, 172, 199, 302, 314,
];

/// SetScore. Server-authoritative and never consumed by this client.
pub const SET_SCORE_ID: u32 = 108;

/// Version-scoped override data.
#[derive(Debug, Clone)]
pub struct OverrideTable {
    protocol: i32,
    ids: HashSet<u32>,
}

impl OverrideTable {
    pub fn new(protocol: i32, ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            protocol,
            ids: ids.into_iter().collect(),
        }
    }

    /// Built-in table for `protocol`; empty for versions it was not written for.
    pub fn for_protocol(protocol: i32) -> Self {
        if protocol == OVERRIDES_PROTOCOL {
            Self::new(protocol, OVERRIDE_IDS_712)
        } else {
            Self::new(protocol, [])
        }
    }

    pub fn protocol(&self) -> i32 {
        self.protocol
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }
}

/// What to do with one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Known(PacketKind),
    Dropped,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct PacketRegistry {
    by_id: HashMap<u32, PacketKind>,
    overrides: OverrideTable,
    dropped: HashSet<u32>,
}

impl PacketRegistry {
    pub fn new(overrides: OverrideTable) -> Self {
        let by_id = PacketKind::KNOWN.iter().map(|k| (k.id(), *k)).collect();
        Self {
            by_id,
            overrides,
            dropped: HashSet::from([SET_SCORE_ID]),
        }
    }

    pub fn for_protocol(protocol: i32) -> Self {
        Self::new(OverrideTable::for_protocol(protocol))
    }

    pub fn resolve(&self, id: u32) -> Resolution {
        if self.dropped.contains(&id) {
            Resolution::Dropped
        } else if self.overrides.contains(id) {
            Resolution::Known(PacketKind::Raw(id))
        } else if let Some(kind) = self.by_id.get(&id) {
            Resolution::Known(*kind)
        } else {
            Resolution::Unknown
        }
    }

    /// Reads the id from the front of a frame and resolves it.
    pub fn resolve_packet_id(&self, frame: Bytes) -> Result<(u32, Resolution, Bytes), CodecError> {
        let (id, body) = split_header(frame)?;
        let resolution = self.resolve(id);
        trace!(target: "packet_pipeline", "Frame id {} -> {:?}", id, resolution);
        Ok((id, resolution, body))
    }
}

impl Default for PacketRegistry {
    fn default() -> Self {
        Self::for_protocol(OVERRIDES_PROTOCOL)
    }
}
