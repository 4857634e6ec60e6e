//! Fixed-width big-endian field codec.
//!
//! Every payload byte written or read goes through the [`CrcEngine`]; the
//! trailing checksum words never do.

use log::trace;

use crate::command::Opcode;
use crate::crc::CrcEngine;
use crate::{ByteChannel, DobotError, Result};

/// Longest request frame: opcode, three step values, control byte and CRC
pub const MAX_REQUEST_SIZE: usize = 16;

/// One request payload field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Byte(u8),
    Word(u16),
    Long(u32),
    SignedLong(i32),
}

/// Codec state of the link: the channel, the CRC accumulator and the
/// request being assembled.
pub struct FrameCodec<CH> {
    channel: CH,
    crc: CrcEngine,
    tx: Vec<u8>,
}

impl<CH: ByteChannel> FrameCodec<CH> {
    pub fn new(channel: CH) -> Self {
        FrameCodec {
            channel,
            crc: CrcEngine::new(),
            tx: Vec::with_capacity(MAX_REQUEST_SIZE),
        }
    }

    /// Starts a request: resets the CRC and seeds it with the opcode
    pub fn begin(&mut self, opcode: Opcode) {
        self.crc.reset();
        self.tx.clear();
        self.write_byte(opcode.value());
    }

    pub fn write_byte(&mut self, value: u8) {
        self.crc.update(value);
        self.tx.push(value);
    }

    pub fn write_word(&mut self, value: u16) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte);
        }
    }

    pub fn write_long(&mut self, value: u32) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte);
        }
    }

    pub fn write_signed_long(&mut self, value: i32) {
        self.write_long(value as u32);
    }

    pub fn write_field(&mut self, field: Field) {
        match field {
            Field::Byte(v) => self.write_byte(v),
            Field::Word(v) => self.write_word(v),
            Field::Long(v) => self.write_long(v),
            Field::SignedLong(v) => self.write_signed_long(v),
        }
    }

    /// Appends the CRC word to the request and puts it on the channel.
    /// Returns the CRC that was sent.
    pub fn end_request(&mut self) -> Result<u16> {
        let crc = self.crc.value();
        self.tx.extend_from_slice(&crc.to_be_bytes());
        trace!("request {:02X?}", self.tx);
        self.channel.write(&self.tx)?;
        Ok(crc)
    }

    /// Builds and sends a complete request frame
    pub fn send(&mut self, opcode: Opcode, payload: &[Field]) -> Result<u16> {
        self.begin(opcode);
        for field in payload {
            self.write_field(*field);
        }
        self.end_request()
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_raw(&mut buf)?;
        self.crc.update(buf[0]);
        Ok(buf[0])
    }

    pub fn read_word(&mut self) -> Result<u16> {
        let high = self.read_byte()?;
        let low = self.read_byte()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    pub fn read_long(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        for byte in bytes.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn read_signed_long(&mut self) -> Result<i32> {
        Ok(self.read_long()? as i32)
    }

    /// Reads the peer's checksum word. Not covered by the CRC.
    pub fn read_checksum_word(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_raw(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Reads the peer's checksum word and compares it with the accumulator
    pub fn verify_checksum(&mut self) -> Result<()> {
        let computed = self.crc.value();
        let reported = self.read_checksum_word()?;
        if computed != reported {
            return Err(DobotError::CrcMismatch { computed, reported });
        }
        Ok(())
    }

    pub fn crc(&self) -> u16 {
        self.crc.value()
    }

    pub fn reset_crc(&mut self) {
        self.crc.reset();
    }

    pub fn flush_input(&mut self) -> Result<()> {
        self.channel.flush_input()?;
        Ok(())
    }

    pub fn into_channel(self) -> CH {
        self.channel
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.channel.read(&mut buf[filled..])? {
                0 => return Err(DobotError::Timeout),
                n => filled += n,
            }
        }
        Ok(())
    }
}
