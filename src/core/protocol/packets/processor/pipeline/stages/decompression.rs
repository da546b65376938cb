use super::common::{PipelineContext, PipelineStage, StageError};
use crate::core::protocol::packets::compression::{decompress, CompressionMethod};

/// Reads the compression tag (only once compression or encryption is armed)
/// and inflates the batch accordingly.
pub struct DecompressionStage;

impl PipelineStage for DecompressionStage {
    fn name(&self) -> &'static str {
        "decompression"
    }

    fn execute(&self, context: &mut PipelineContext<'_>) -> Result<(), StageError> {
        let data = context
            .decrypted_data
            .take()
            .ok_or(StageError::MissingInput("decompression"))?;

        let tagged = context.compression_armed || context.encryptor.is_some();
        let out = if tagged {
            match CompressionMethod::sniff(&data) {
                CompressionMethod::NotPresent => data,
                method => decompress(method, &data[1..]).map_err(StageError::DecompressionFailed)?,
            }
        } else {
            data
        };

        context.decompressed_data = Some(out);
        Ok(())
    }
}
