use crate::core::protocol::packets::game::packet::PacketKind;

/// Scheduling hint handed to the transport with every outbound batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Immediate,
    #[default]
    Normal,
}

/// Handshake packets go out immediately; everything else is normal.
pub fn determine_priority(kind: PacketKind) -> Priority {
    match kind {
        PacketKind::RequestNetworkSettings
        | PacketKind::Login
        | PacketKind::ClientToServerHandshake
        | PacketKind::ResourcePackClientResponse
        | PacketKind::RequestChunkRadius
        | PacketKind::Disconnect => Priority::Immediate,
        _ => Priority::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_traffic_is_immediate() {
        assert_eq!(determine_priority(PacketKind::Login), Priority::Immediate);
        assert_eq!(determine_priority(PacketKind::Text), Priority::Normal);
        assert_eq!(determine_priority(PacketKind::Raw(39)), Priority::Normal);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
