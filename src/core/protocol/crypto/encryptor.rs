use tracing::{trace, warn};

use crate::core::protocol::crypto::cipher::checksum::{compute_checksum, verify_checksum, CHECKSUM_SIZE};
use crate::core::protocol::crypto::cipher::stream_cipher::StreamCipherHalf;
use crate::core::protocol::crypto::key_manager::session_keys::SessionKeys;
use crate::core::protocol::error::{CryptoError, ProtocolResult};
use crate::core::protocol::packets::compression::CompressionSettings;
use crate::core::protocol::packets::header::GAME_PACKET_HEADER;

/// Per-direction counters and keystreams of an armed session.
pub struct CipherState {
    send_counter: u64,
    receive_counter: u64,
    cipher: StreamCipherHalf,
    decipher: StreamCipherHalf,
}

impl CipherState {
    pub fn new(keys: &SessionKeys) -> Result<Self, CryptoError> {
        Ok(Self {
            send_counter: 0,
            receive_counter: 0,
            cipher: StreamCipherHalf::new(keys.key(), keys.iv())?,
            decipher: StreamCipherHalf::new(keys.key(), keys.iv())?,
        })
    }

    pub fn send_counter(&self) -> u64 {
        self.send_counter
    }

    pub fn receive_counter(&self) -> u64 {
        self.receive_counter
    }
}

/// Checksums, encrypts and decrypts batches once the handshake challenge has
/// been answered.
pub struct PacketEncryptor {
    keys: SessionKeys,
    state: CipherState,
    compression: CompressionSettings,
}

impl PacketEncryptor {
    pub fn new(keys: SessionKeys, compression: CompressionSettings) -> Result<Self, CryptoError> {
        let state = CipherState::new(&keys)?;
        Ok(Self {
            keys,
            state,
            compression,
        })
    }

    pub fn state(&self) -> &CipherState {
        &self.state
    }

    pub fn set_compression(&mut self, compression: CompressionSettings) {
        self.compression = compression;
    }

    /// `framed` -> `0xFE || E(tag || body || checksum)`.
    pub fn encrypt(&mut self, framed: &[u8]) -> ProtocolResult<Vec<u8>> {
        let mut payload = self.compression.compress(framed)?;
        let checksum = compute_checksum(self.state.send_counter, &payload, self.keys.key());
        payload.extend_from_slice(&checksum);

        self.state.cipher.apply(&mut payload);
        self.state.send_counter += 1;

        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push(GAME_PACKET_HEADER);
        out.extend_from_slice(&payload);

        trace!(target: "packet_pipeline", "Encrypted batch #{} ({} bytes)", self.state.send_counter - 1, out.len());
        Ok(out)
    }

    /// Decrypts a batch (header already stripped) and returns the compressed
    /// payload. The receive counter moves forward even when the checksum does
    /// not match, since the peer's counter and the keystream already have.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut buf = ciphertext.to_vec();
        self.state.decipher.apply(&mut buf);

        let counter = self.state.receive_counter;
        self.state.receive_counter += 1;

        if buf.len() < CHECKSUM_SIZE {
            warn!(target: "packet_pipeline", "Batch #{} shorter than its checksum", counter);
            return Err(CryptoError::TruncatedBatch { len: buf.len() });
        }

        let split = buf.len() - CHECKSUM_SIZE;
        let (payload, checksum) = buf.split_at(split);
        if !verify_checksum(counter, payload, self.keys.key(), checksum) {
            warn!(target: "packet_pipeline", "Checksum mismatch on batch #{}, dropping it", counter);
            return Err(CryptoError::ChecksumMismatch { counter });
        }

        buf.truncate(split);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::packets::compression::{decompress, CompressionMethod};

    fn pair() -> (PacketEncryptor, PacketEncryptor) {
        let keys = SessionKeys::derive(b"salt", &[7u8; 48]);
        let settings = CompressionSettings::new(64, 7);
        (
            PacketEncryptor::new(keys.clone(), settings).unwrap(),
            PacketEncryptor::new(keys, settings).unwrap(),
        )
    }

    fn open(peer: &mut PacketEncryptor, wire: &[u8]) -> Result<Vec<u8>, CryptoError> {
        assert_eq!(wire[0], GAME_PACKET_HEADER);
        peer.decrypt(&wire[1..])
    }

    #[test]
    fn counters_track_successful_batches() {
        let (mut client, mut server) = pair();
        for i in 0..5u8 {
            let wire = client.encrypt(&[i; 10]).unwrap();
            let payload = open(&mut server, &wire).unwrap();
            assert_eq!(payload, [&[0xFF][..], &[i; 10]].concat());
        }
        assert_eq!(client.state().send_counter(), 5);
        assert_eq!(server.state().receive_counter(), 5);
        assert_eq!(client.state().receive_counter(), 0);
    }

    #[test]
    fn large_batches_are_deflated_before_sealing() {
        let (mut client, mut server) = pair();
        let framed = vec![0x33u8; 1000];
        let wire = client.encrypt(&framed).unwrap();
        assert!(wire.len() < framed.len());

        let payload = open(&mut server, &wire).unwrap();
        assert_eq!(CompressionMethod::sniff(&payload), CompressionMethod::Zlib);
        assert_eq!(decompress(CompressionMethod::Zlib, &payload[1..]).unwrap(), framed);
    }

    #[test]
    fn tampered_batch_is_dropped_and_counter_still_advances() {
        let (mut client, mut server) = pair();

        let mut bad = client.encrypt(b"first").unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        assert_eq!(
            open(&mut server, &bad).unwrap_err(),
            CryptoError::ChecksumMismatch { counter: 0 }
        );
        assert_eq!(server.state().receive_counter(), 1);

        // The next batch stays decryptable.
        let good = client.encrypt(b"second").unwrap();
        let payload = open(&mut server, &good).unwrap();
        assert_eq!(&payload[1..], b"second");
        assert_eq!(server.state().receive_counter(), 2);
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        let (_, mut server) = pair();
        assert_eq!(
            server.decrypt(&[1, 2, 3]).unwrap_err(),
            CryptoError::TruncatedBatch { len: 3 }
        );
    }

    #[test]
    fn different_keys_fail_the_checksum() {
        let (mut client, _) = pair();
        let mut stranger = PacketEncryptor::new(
            SessionKeys::derive(b"other", &[7u8; 48]),
            CompressionSettings::new(64, 7),
        )
        .unwrap();
        let wire = client.encrypt(b"hello").unwrap();
        assert!(matches!(
            stranger.decrypt(&wire[1..]),
            Err(CryptoError::ChecksumMismatch { .. })
        ));
    }
}
