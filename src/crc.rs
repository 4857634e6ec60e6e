//! CRC16-CCITT accumulator shared by the request and response halves of a
//! transaction.
//!
//! Polynomial 0x1021, MSB first, seeded with 0xFFFF and no final xor. This
//! is the `CRC_16_IBM_3740` catalog entry of the `crc` crate (also known as
//! CCITT-FALSE).

use crc::{Crc, Digest, CRC_16_IBM_3740};

static CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Initial value of the accumulator
pub const CRC_SEED: u16 = 0xFFFF;

/// Stateful CRC engine, reset at the start of every transaction
#[derive(Clone)]
pub struct CrcEngine {
    digest: Digest<'static, u16>,
}

impl CrcEngine {
    pub fn new() -> Self {
        CrcEngine {
            digest: CCITT.digest(),
        }
    }

    pub fn reset(&mut self) {
        self.digest = CCITT.digest();
    }

    pub fn update(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    pub fn update_all(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Current accumulator state, `CRC_SEED` right after a reset
    pub fn value(&self) -> u16 {
        self.digest.clone().finalize()
    }
}

impl Default for CrcEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC of a complete byte sequence
pub fn checksum(bytes: &[u8]) -> u16 {
    CCITT.checksum(bytes)
}
