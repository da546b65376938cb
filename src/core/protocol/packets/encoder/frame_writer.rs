use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::core::protocol::packets::stream::{var_u32_len, write_var_u32};

/// Concatenates serialized packets into one batch, each prefixed by its
/// length as an unsigned varint. Order is preserved.
pub fn frame<T: AsRef<[u8]>>(packets: &[T]) -> Vec<u8> {
    let capacity = packets
        .iter()
        .map(|p| {
            let len = p.as_ref().len();
            var_u32_len(len as u32) + len
        })
        .sum();

    let mut out = BytesMut::with_capacity(capacity);
    for packet in packets {
        let packet = packet.as_ref();
        write_var_u32(&mut out, packet.len() as u32);
        out.put_slice(packet);
    }

    trace!(target: "packet_pipeline", "Framed {} packets into {} bytes", packets.len(), out.len());
    out.to_vec()
}
