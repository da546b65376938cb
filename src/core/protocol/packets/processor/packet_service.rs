use bytes::Bytes;
use tracing::{trace, warn};

use crate::core::protocol::crypto::encryptor::PacketEncryptor;
use crate::core::protocol::error::ProtocolResult;
use crate::core::protocol::packets::compression::CompressionSettings;
use crate::core::protocol::packets::encoder::frame_writer::frame;
use crate::core::protocol::packets::game::packet::Packet;
use crate::core::protocol::packets::header::GAME_PACKET_HEADER;
use crate::core::protocol::packets::processor::pipeline::orchestrator::PipelineOrchestrator;
use crate::core::protocol::packets::processor::pipeline::stages::common::PipelineContext;

/// Outbound encoding and inbound decoding of batches for one session.
pub struct PacketPipeline {
    compression: Option<CompressionSettings>,
    encryptor: Option<PacketEncryptor>,
    inbound: PipelineOrchestrator,
    compression_level: u32,
}

impl PacketPipeline {
    pub fn new(compression_level: u32) -> Self {
        Self {
            compression: None,
            encryptor: None,
            inbound: PipelineOrchestrator::inbound(),
            compression_level,
        }
    }

    pub fn arm_compression(&mut self, threshold: u16) {
        let settings = CompressionSettings::new(threshold, self.compression_level);
        self.compression = Some(settings);
        if let Some(encryptor) = self.encryptor.as_mut() {
            encryptor.set_compression(settings);
        }
    }

    /// Settings the encryptor should compress with.
    pub fn effective_compression(&self) -> CompressionSettings {
        self.compression
            .unwrap_or_else(|| CompressionSettings::new(0, self.compression_level))
    }

    pub fn arm_encryption(&mut self, encryptor: PacketEncryptor) {
        self.encryptor = Some(encryptor);
    }

    pub fn encryptor(&self) -> Option<&PacketEncryptor> {
        self.encryptor.as_ref()
    }

    /// `framed` -> bytes handed to the transport, header included.
    pub fn prepare_payload(&mut self, framed: &[u8]) -> ProtocolResult<Vec<u8>> {
        if let Some(encryptor) = self.encryptor.as_mut() {
            return encryptor.encrypt(framed);
        }

        let body = match &self.compression {
            Some(settings) => settings.compress(framed)?,
            None => framed.to_vec(),
        };

        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(GAME_PACKET_HEADER);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Serializes, frames and prepares a batch of packets.
    pub fn encode(&mut self, packets: &[Packet]) -> ProtocolResult<Vec<u8>> {
        let serialized = packets
            .iter()
            .map(Packet::serialize)
            .collect::<Result<Vec<Bytes>, _>>()?;
        let batch = frame(&serialized);
        trace!(target: "packet_pipeline", "Framed {} packet(s) into {} bytes", packets.len(), batch.len());
        self.prepare_payload(&batch)
    }

    /// Runs one inbound batch (header byte already stripped) through the
    /// stages. A failing stage drops the whole batch.
    pub fn consume_inbound(&mut self, payload: Bytes) -> Vec<Bytes> {
        let compression_armed = self.compression.is_some();
        let context = PipelineContext::new(payload, self.encryptor.as_mut(), compression_armed);
        match self.inbound.execute(context) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(target: "packet_pipeline", "Dropping batch: {}", e);
                Vec::new()
            }
        }
    }
}
