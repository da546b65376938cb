use crate::core::protocol::packets::game::handshake::PlayStatusKind;
use crate::core::protocol::packets::game::world::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    AwaitingTransportConnect,
    AwaitingNetworkSettings,
    /// Login sent; waiting for the handshake challenge or a play status.
    AwaitingLogin,
    AwaitingStartGame,
    Spawned,
    Disconnected,
}

impl SessionState {
    pub fn is_closed(self) -> bool {
        self == SessionState::Disconnected
    }
}

/// Per-connection mutable state. Only the connection's event loop touches it.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: SessionState,
    pub protocol: i32,
    pub tick: u64,
    pub position: Vec3,
    pub runtime_entity_id: Option<u64>,
    pub play_status: Option<PlayStatusKind>,
    pub compression_threshold: Option<u16>,
    /// PlayerSpawn arrived before StartGame; finish spawning once it does.
    pub spawn_pending: bool,
    pub spawn_emitted: bool,
}

impl Session {
    pub fn new(protocol: i32) -> Self {
        Self {
            state: SessionState::Created,
            protocol,
            tick: 0,
            position: Vec3::default(),
            runtime_entity_id: None,
            play_status: None,
            compression_threshold: None,
            spawn_pending: false,
            spawn_emitted: false,
        }
    }

    pub fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Moves forward, never back out of `Disconnected`.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if self.state.is_closed() || self.state == next {
            return false;
        }
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_is_terminal() {
        let mut session = Session::new(712);
        assert!(session.transition(SessionState::AwaitingTransportConnect));
        assert!(session.transition(SessionState::Disconnected));
        assert!(!session.transition(SessionState::Spawned));
        assert_eq!(session.state, SessionState::Disconnected);
    }

    #[test]
    fn ticks_count_up() {
        let mut session = Session::new(712);
        assert_eq!(session.advance_tick(), 1);
        assert_eq!(session.advance_tick(), 2);
    }
}
