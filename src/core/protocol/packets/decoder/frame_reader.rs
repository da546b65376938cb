use bytes::{Buf, Bytes};
use tracing::trace;

use crate::core::protocol::error::CodecError;
use crate::core::protocol::packets::stream::read_var_u32;

/// Splits a batch back into the packet byte ranges written by
/// [`frame`](crate::core::protocol::packets::encoder::frame_writer::frame).
/// The returned frames share the batch allocation.
pub fn unframe(batch: Bytes) -> Result<Vec<Bytes>, CodecError> {
    let mut cursor = batch;
    let mut frames = Vec::new();

    while cursor.has_remaining() {
        let length = read_var_u32(&mut cursor)? as usize;
        if length > cursor.remaining() {
            return Err(CodecError::FrameOverrun {
                length,
                remaining: cursor.remaining(),
            });
        }
        frames.push(cursor.split_to(length));
    }

    trace!(target: "packet_pipeline", "Unframed {} packets", frames.len());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::packets::encoder::frame_writer::frame;

    fn round_trip(packets: Vec<Vec<u8>>) {
        let batch = frame(&packets);
        let frames = unframe(Bytes::from(batch)).unwrap();
        let frames: Vec<Vec<u8>> = frames.into_iter().map(|f| f.to_vec()).collect();
        assert_eq!(frames, packets);
    }

    #[test]
    fn empty_batch_round_trips() {
        round_trip(vec![]);
        assert!(frame::<Vec<u8>>(&[]).is_empty());
    }

    #[test]
    fn single_byte_and_empty_frames_round_trip() {
        round_trip(vec![vec![0x01]]);
        round_trip(vec![vec![], vec![0xFE], vec![]]);
    }

    #[test]
    fn frames_longer_than_one_varint_byte() {
        round_trip(vec![vec![7u8; 127], vec![8u8; 128], vec![9u8; 70_000]]);
    }

    #[test]
    fn truncated_batch_is_rejected() {
        let mut batch = frame(&[vec![1u8, 2, 3, 4]]);
        batch.pop();
        assert_eq!(
            unframe(Bytes::from(batch)),
            Err(CodecError::FrameOverrun { length: 4, remaining: 3 })
        );
    }
}
