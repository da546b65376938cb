use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::core::protocol::packets::game::packet::{Packet, PacketKind};
use crate::core::protocol::packets::registry::{PacketRegistry, Resolution};

pub type Listener = Arc<dyn Fn(&Packet) + Send + Sync>;

/// Outcome of dispatching one frame.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Dispatched(Arc<Packet>),
    Dropped(u32),
    Unknown(u32),
    Malformed { id: u32, reason: String },
}

/// Maps packet kinds to external listeners. Frames that cannot be resolved or
/// decoded are logged and skipped; they never abort the batch.
pub struct PacketDispatcher {
    registry: PacketRegistry,
    listeners: HashMap<PacketKind, Vec<Listener>>,
}

impl PacketDispatcher {
    pub fn new(registry: PacketRegistry) -> Self {
        Self {
            registry,
            listeners: HashMap::new(),
        }
    }

    pub fn on(&mut self, kind: PacketKind, listener: Listener) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn dispatch(&self, frame: Bytes) -> DispatchOutcome {
        let (id, resolution, body) = match self.registry.resolve_packet_id(frame) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(target: "packet_pipeline", "Unreadable packet header: {}", e);
                return DispatchOutcome::Malformed {
                    id: 0,
                    reason: e.to_string(),
                };
            }
        };

        let kind = match resolution {
            Resolution::Known(kind) => kind,
            Resolution::Dropped => {
                trace!(target: "packet_pipeline", "Dropping packet id {}", id);
                return DispatchOutcome::Dropped(id);
            }
            Resolution::Unknown => {
                warn!(target: "packet_pipeline", "Unknown packet id {} ({} bytes), skipping", id, body.len());
                return DispatchOutcome::Unknown(id);
            }
        };

        let packet = match Packet::deserialize(kind, body) {
            Ok(packet) => Arc::new(packet),
            Err(e) => {
                warn!(target: "packet_pipeline", "Failed to decode packet id {}: {}", id, e);
                return DispatchOutcome::Malformed {
                    id,
                    reason: e.to_string(),
                };
            }
        };

        if let Some(listeners) = self.listeners.get(&kind) {
            debug!(target: "packet_pipeline", "Packet {:?} -> {} listener(s)", kind, listeners.len());
            for listener in listeners {
                listener(&packet);
            }
        }

        DispatchOutcome::Dispatched(packet)
    }

    /// Dispatches every frame in order and returns the decoded packets.
    pub fn dispatch_all(&self, frames: Vec<Bytes>) -> Vec<Arc<Packet>> {
        frames
            .into_iter()
            .filter_map(|frame| match self.dispatch(frame) {
                DispatchOutcome::Dispatched(packet) => Some(packet),
                _ => None,
            })
            .collect()
    }
}
