//! Little binary stream helpers shared by the packet codecs and the batch
//! framer. Layouts follow the Bedrock conventions: unsigned LEB128 varints,
//! zig-zag signed varints, length-prefixed UTF-8 strings.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::core::protocol::error::CodecError;

const MAX_VARINT32_BYTES: usize = 5;
const MAX_VARINT64_BYTES: usize = 10;

pub fn write_var_u32(buf: &mut impl BufMut, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn write_var_u64(buf: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn read_var_u32(buf: &mut impl Buf) -> Result<u32, CodecError> {
    let mut result = 0u32;
    for i in 0..MAX_VARINT32_BYTES {
        if !buf.has_remaining() {
            return Err(CodecError::UnexpectedEof { needed: 1 });
        }
        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(CodecError::VarIntTooLong {
        max_bytes: MAX_VARINT32_BYTES,
    })
}

pub fn read_var_u64(buf: &mut impl Buf) -> Result<u64, CodecError> {
    let mut result = 0u64;
    for i in 0..MAX_VARINT64_BYTES {
        if !buf.has_remaining() {
            return Err(CodecError::UnexpectedEof { needed: 1 });
        }
        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(CodecError::VarIntTooLong {
        max_bytes: MAX_VARINT64_BYTES,
    })
}

/// Number of bytes `value` takes as an unsigned varint.
pub fn var_u32_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Writer used by the hand-written packet encoders.
#[derive(Default)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
        }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(value as u8);
        self
    }

    pub fn u16_le(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16_le(value);
        self
    }

    pub fn i32_be(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    pub fn i32_le(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn u64_le(&mut self, value: u64) -> &mut Self {
        self.buf.put_u64_le(value);
        self
    }

    pub fn f32_le(&mut self, value: f32) -> &mut Self {
        self.buf.put_f32_le(value);
        self
    }

    pub fn var_u32(&mut self, value: u32) -> &mut Self {
        write_var_u32(&mut self.buf, value);
        self
    }

    pub fn var_i32(&mut self, value: i32) -> &mut Self {
        write_var_u32(&mut self.buf, ((value << 1) ^ (value >> 31)) as u32);
        self
    }

    pub fn var_u64(&mut self, value: u64) -> &mut Self {
        write_var_u64(&mut self.buf, value);
        self
    }

    pub fn var_i64(&mut self, value: i64) -> &mut Self {
        write_var_u64(&mut self.buf, ((value << 1) ^ (value >> 63)) as u64);
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        write_var_u32(&mut self.buf, value.len() as u32);
        self.buf.put_slice(value.as_bytes());
        self
    }

    /// String with a little-endian `i32` length, as used inside the login blob.
    pub fn string_i32_le(&mut self, value: &str) -> &mut Self {
        self.buf.put_i32_le(value.len() as i32);
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buf.put_slice(value);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor used by the hand-written packet decoders. Every read is bounds
/// checked and reports how many bytes were missing.
pub struct PacketReader {
    buf: Bytes,
}

impl PacketReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                needed: needed - self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.u8()? != 0)
    }

    pub fn u16_le(&mut self) -> Result<u16, CodecError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn i32_be(&mut self) -> Result<i32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn i32_le(&mut self) -> Result<i32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn u64_le(&mut self) -> Result<u64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn f32_le(&mut self) -> Result<f32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn var_u32(&mut self) -> Result<u32, CodecError> {
        read_var_u32(&mut self.buf)
    }

    pub fn var_i32(&mut self) -> Result<i32, CodecError> {
        let raw = read_var_u32(&mut self.buf)?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    pub fn var_u64(&mut self) -> Result<u64, CodecError> {
        read_var_u64(&mut self.buf)
    }

    pub fn var_i64(&mut self) -> Result<i64, CodecError> {
        let raw = read_var_u64(&mut self.buf)?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    pub fn bytes(&mut self, len: usize) -> Result<Bytes, CodecError> {
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    pub fn string(&mut self) -> Result<String, CodecError> {
        let len = self.var_u32()? as usize;
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidString)
    }

    pub fn string_i32_le(&mut self) -> Result<String, CodecError> {
        let len = self.i32_le()?;
        if len < 0 {
            return Err(CodecError::InvalidString);
        }
        let raw = self.bytes(len as usize)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidString)
    }

    pub fn rest(&mut self) -> Bytes {
        let len = self.buf.remaining();
        self.buf.split_to(len)
    }
}
