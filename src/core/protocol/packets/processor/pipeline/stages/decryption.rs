use tracing::trace;

use super::common::{PipelineContext, PipelineStage, StageError};

/// Strips the cipher and checksum when encryption is armed; otherwise passes
/// the payload through.
pub struct DecryptionStage;

impl PipelineStage for DecryptionStage {
    fn name(&self) -> &'static str {
        "decryption"
    }

    fn execute(&self, context: &mut PipelineContext<'_>) -> Result<(), StageError> {
        let data = match context.encryptor.as_deref_mut() {
            Some(encryptor) => {
                let plain = encryptor.decrypt(&context.raw_payload)?;
                trace!(target: "packet_pipeline", "Decrypted {} -> {} bytes", context.raw_payload.len(), plain.len());
                plain
            }
            None => context.raw_payload.to_vec(),
        };
        context.decrypted_data = Some(data);
        Ok(())
    }
}
