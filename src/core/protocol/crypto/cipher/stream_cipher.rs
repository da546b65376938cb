use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr32BE;

use crate::core::protocol::error::CryptoError;

type Aes256Ctr = Ctr32BE<Aes256>;

/// Initial counter block used by the peer: the 12-byte nonce followed by a
/// big-endian block counter starting at 2. This is the keystream AES-256-GCM
/// produces for its payload when the tag is never finalized, so the same
/// construction serves both directions.
pub fn counter_block(iv: &[u8; 16]) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[..12].copy_from_slice(&iv[..12]);
    block[12..].copy_from_slice(&[0, 0, 0, 2]);
    block
}

/// One direction of the session stream cipher. The keystream position is
/// carried across calls, so batches must be processed in wire order.
pub struct StreamCipherHalf {
    inner: Aes256Ctr,
}

impl StreamCipherHalf {
    pub fn new(key: &[u8; 32], iv: &[u8; 16]) -> Result<Self, CryptoError> {
        let block = counter_block(iv);
        let inner = Aes256Ctr::new_from_slices(key, &block)?;
        Ok(Self { inner })
    }

    pub fn apply(&mut self, buf: &mut [u8]) {
        self.inner.apply_keystream(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::AeadInPlace;
    use aes_gcm::{Aes256Gcm, KeyInit, Nonce};

    const KEY: [u8; 32] = [0x11; 32];
    const IV: [u8; 16] = [0x22; 16];

    // A peer encrypting with "aes-256-gcm" (12-byte IV) and one decrypting
    // with "aes-256-ctr" (IV || 00000002) both see this keystream.
    #[test]
    fn matches_untagged_gcm_keystream() {
        let plaintext = b"batch payload that spans more than one AES block....".to_vec();

        let mut ours = plaintext.clone();
        StreamCipherHalf::new(&KEY, &IV).unwrap().apply(&mut ours);

        let mut gcm = plaintext.clone();
        let cipher = Aes256Gcm::new_from_slice(&KEY).unwrap();
        cipher
            .encrypt_in_place_detached(Nonce::from_slice(&IV[..12]), b"", &mut gcm)
            .unwrap();

        assert_eq!(ours, gcm);
    }

    #[test]
    fn keystream_continues_across_calls() {
        let data = vec![0xAB; 100];

        let mut whole = data.clone();
        StreamCipherHalf::new(&KEY, &IV).unwrap().apply(&mut whole);

        let mut split = data.clone();
        let mut half = StreamCipherHalf::new(&KEY, &IV).unwrap();
        let (a, b) = split.split_at_mut(37);
        half.apply(a);
        half.apply(b);

        assert_eq!(whole, split);
    }

    #[test]
    fn opposite_halves_invert_each_other() {
        let mut buf = b"hello".to_vec();
        StreamCipherHalf::new(&KEY, &IV).unwrap().apply(&mut buf);
        assert_ne!(&buf, b"hello");
        StreamCipherHalf::new(&KEY, &IV).unwrap().apply(&mut buf);
        assert_eq!(&buf, b"hello");
    }
}
