use bytes::Bytes;

use super::common::{PipelineContext, PipelineStage, StageError};
use crate::core::protocol::packets::decoder::frame_reader::unframe;

pub struct UnframeStage;

impl PipelineStage for UnframeStage {
    fn name(&self) -> &'static str {
        "unframe"
    }

    fn execute(&self, context: &mut PipelineContext<'_>) -> Result<(), StageError> {
        let data = context
            .decompressed_data
            .take()
            .ok_or(StageError::MissingInput("unframe"))?;
        context.frames = unframe(Bytes::from(data)).map_err(StageError::UnframeFailed)?;
        Ok(())
    }
}
