use std::sync::Arc;

use crate::core::protocol::packets::game::packet::Packet;

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The player is in the world. Raised at most once per session.
    Spawn,
    Tick(u64),
    Packet(Arc<Packet>),
    Disconnected { reason: String },
}
