use bytes::Bytes;
use thiserror::Error;

use crate::core::protocol::crypto::encryptor::PacketEncryptor;
use crate::core::protocol::error::{CodecError, CryptoError};

/// State carried through the inbound stages for one batch.
pub struct PipelineContext<'a> {
    pub encryptor: Option<&'a mut PacketEncryptor>,
    pub compression_armed: bool,
    pub raw_payload: Bytes,
    pub decrypted_data: Option<Vec<u8>>,
    pub decompressed_data: Option<Vec<u8>>,
    pub frames: Vec<Bytes>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(raw_payload: Bytes, encryptor: Option<&'a mut PacketEncryptor>, compression_armed: bool) -> Self {
        Self {
            encryptor,
            compression_armed,
            raw_payload,
            decrypted_data: None,
            decompressed_data: None,
            frames: Vec::new(),
        }
    }
}

pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(&self, context: &mut PipelineContext<'_>) -> Result<(), StageError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Decryption failed: {0}")]
    DecryptionFailed(#[from] CryptoError),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(CodecError),

    #[error("Unframing failed: {0}")]
    UnframeFailed(CodecError),

    #[error("Stage {0} ran without its input")]
    MissingInput(&'static str),
}
