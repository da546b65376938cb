/// Leading byte of every game packet batch.
pub const GAME_PACKET_HEADER: u8 = 0xFE;
/// Leading byte of a transport-level disconnect notification.
pub const DISCONNECT_HEADER: u8 = 0x15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireHeader {
    Game,
    Disconnect,
    Unknown(u8),
}

impl WireHeader {
    pub fn classify(payload: &[u8]) -> Option<Self> {
        let first = *payload.first()?;
        Some(match first {
            GAME_PACKET_HEADER => WireHeader::Game,
            DISCONNECT_HEADER => WireHeader::Disconnect,
            other => WireHeader::Unknown(other),
        })
    }
}
