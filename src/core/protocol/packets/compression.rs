use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use tracing::{debug, trace};

use crate::core::protocol::error::CodecError;

/// Upper bound for one inflated batch.
pub const MAX_INFLATED_SIZE: usize = 8 * 1024 * 1024;

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Zlib,
    Snappy,
    None,
    /// No tag byte in front of the batch.
    NotPresent,
}

impl CompressionMethod {
    pub fn tag(self) -> Option<u8> {
        match self {
            CompressionMethod::Zlib => Some(0x00),
            CompressionMethod::Snappy => Some(0x01),
            CompressionMethod::None => Some(0xFF),
            CompressionMethod::NotPresent => None,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0x00 => CompressionMethod::Zlib,
            0x01 => CompressionMethod::Snappy,
            0xFF => CompressionMethod::None,
            _ => CompressionMethod::NotPresent,
        }
    }

    /// Method id as announced in the network settings packet.
    pub fn from_settings_id(id: u16) -> Self {
        match id {
            0 => CompressionMethod::Zlib,
            1 => CompressionMethod::Snappy,
            _ => CompressionMethod::None,
        }
    }

    /// Reads the leading tag of an inbound batch. Unknown leading bytes mean
    /// the tag is absent and the batch starts directly with a frame.
    pub fn sniff(batch: &[u8]) -> Self {
        batch
            .first()
            .map(|b| Self::from_tag(*b))
            .unwrap_or(CompressionMethod::NotPresent)
    }
}

/// Compression parameters negotiated with the peer.
#[derive(Debug, Clone, Copy)]
pub struct CompressionSettings {
    pub threshold: u16,
    pub level: u32,
}

impl CompressionSettings {
    pub fn new(threshold: u16, level: u32) -> Self {
        Self { threshold, level }
    }

    /// Produces `tag || body`: deflated when the batch is above the threshold,
    /// untouched behind a `None` tag otherwise.
    pub fn compress(&self, framed: &[u8]) -> Result<Vec<u8>, CodecError> {
        if framed.len() > self.threshold as usize {
            let mut out = vec![0x00];
            out.extend_from_slice(&deflate_raw(framed, self.level)?);
            trace!(target: "packet_pipeline", "Deflated {} -> {} bytes", framed.len(), out.len() - 1);
            Ok(out)
        } else {
            let mut out = Vec::with_capacity(framed.len() + 1);
            out.push(0xFF);
            out.extend_from_slice(framed);
            Ok(out)
        }
    }
}

pub fn deflate_raw(data: &[u8], level: u32) -> Result<Vec<u8>, CodecError> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| CodecError::Compression { reason: e.to_string() })?;
    encoder
        .finish()
        .map_err(|e| CodecError::Compression { reason: e.to_string() })
}

pub fn inflate_raw(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(data.len() * 2);
    DeflateDecoder::new(data)
        .take(MAX_INFLATED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Decompression { reason: e.to_string() })?;

    if out.len() > MAX_INFLATED_SIZE {
        return Err(CodecError::Decompression {
            reason: format!("inflated batch exceeds {} bytes", MAX_INFLATED_SIZE),
        });
    }

    debug!(target: "packet_pipeline", "Inflated {} -> {} bytes", data.len(), out.len());
    Ok(out)
}

/// Undoes the compression announced by `method` on a batch whose tag byte has
/// already been stripped.
pub fn decompress(method: CompressionMethod, body: &[u8]) -> Result<Vec<u8>, CodecError> {
    match method {
        CompressionMethod::Zlib => inflate_raw(body),
        CompressionMethod::None | CompressionMethod::NotPresent => Ok(body.to_vec()),
        CompressionMethod::Snappy => Err(CodecError::UnsupportedCompression(0x01)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_batches_get_the_none_tag() {
        let settings = CompressionSettings::new(256, DEFAULT_COMPRESSION_LEVEL);
        let out = settings.compress(&[1, 2, 3]).unwrap();
        assert_eq!(out, vec![0xFF, 1, 2, 3]);
    }

    #[test]
    fn large_batches_are_deflated() {
        let settings = CompressionSettings::new(1, DEFAULT_COMPRESSION_LEVEL);
        let framed = vec![0x42u8; 4096];
        let out = settings.compress(&framed).unwrap();
        assert_eq!(CompressionMethod::sniff(&out), CompressionMethod::Zlib);
        assert!(out.len() < framed.len());
        assert_eq!(decompress(CompressionMethod::Zlib, &out[1..]).unwrap(), framed);
    }

    #[test]
    fn unknown_leading_byte_means_no_tag() {
        assert_eq!(CompressionMethod::sniff(&[0x0C, 0x01]), CompressionMethod::NotPresent);
        assert_eq!(CompressionMethod::sniff(&[]), CompressionMethod::NotPresent);
    }

    #[test]
    fn snappy_is_recognised_but_rejected() {
        assert_eq!(
            decompress(CompressionMethod::Snappy, &[1, 2]),
            Err(CodecError::UnsupportedCompression(0x01))
        );
    }

    #[test]
    fn garbage_fails_to_inflate() {
        assert!(inflate_raw(&[0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }
}
