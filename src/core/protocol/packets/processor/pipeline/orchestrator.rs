use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::core::protocol::packets::processor::pipeline::stages::common::{
    PipelineContext, PipelineStage, StageError,
};
use crate::core::protocol::packets::processor::pipeline::stages::decompression::DecompressionStage;
use crate::core::protocol::packets::processor::pipeline::stages::decryption::DecryptionStage;
use crate::core::protocol::packets::processor::pipeline::stages::unframe::UnframeStage;

const SLOW_BATCH: Duration = Duration::from_millis(20);

pub struct PipelineOrchestrator {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Default for PipelineOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOrchestrator {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// decrypt -> decompress -> unframe
    pub fn inbound() -> Self {
        Self::new()
            .add_stage(DecryptionStage)
            .add_stage(DecompressionStage)
            .add_stage(UnframeStage)
    }

    pub fn add_stage<S: PipelineStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn execute(&self, mut context: PipelineContext<'_>) -> Result<Vec<Bytes>, StageError> {
        let start_time = Instant::now();

        for stage in &self.stages {
            trace!(target: "packet_pipeline", "Executing stage {}", stage.name());
            stage.execute(&mut context)?;
        }

        let elapsed = start_time.elapsed();
        if elapsed > SLOW_BATCH {
            debug!(target: "packet_pipeline", "Slow batch: {} frames in {:?}", context.frames.len(), elapsed);
        }
        Ok(context.frames)
    }
}
