use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

pub const CHECKSUM_SIZE: usize = 8;

/// First 8 bytes of `SHA-256(counter_le64 || payload || key)`.
pub fn compute_checksum(counter: u64, payload: &[u8], key: &[u8; 32]) -> [u8; CHECKSUM_SIZE] {
    let mut digest = Sha256::new();
    digest.update(counter.to_le_bytes());
    digest.update(payload);
    digest.update(key);
    let hash = digest.finalize();

    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&hash[..CHECKSUM_SIZE]);
    out
}

pub fn verify_checksum(counter: u64, payload: &[u8], key: &[u8; 32], received: &[u8]) -> bool {
    let expected = compute_checksum(counter, payload, key);
    constant_time_eq(&expected, received)
}
