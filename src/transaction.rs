//! Request/response transactions over the shared channel.
//!
//! A [`Transport`] owns the channel behind a mutex. The guard is taken before
//! the first request byte and held until the last response byte of the
//! final attempt, so concurrent callers never interleave on the wire.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::codec::{Field, FrameCodec};
use crate::command::Opcode;
use crate::config::DriverConfig;
use crate::{ByteChannel, DobotError, Result};

/// Flush-and-read rounds used to drain a desynchronised stream
const RESYNC_ROUNDS: usize = 5;

pub struct Transport<CH> {
    link: Mutex<FrameCodec<CH>>,
    attempts: u8,
    verify_write_ack: bool,
}

impl<CH: ByteChannel> Transport<CH> {
    pub fn new(channel: CH, config: &DriverConfig) -> Self {
        Transport {
            link: Mutex::new(FrameCodec::new(channel)),
            attempts: config.attempts(),
            verify_write_ack: config.verify_write_ack,
        }
    }

    /// Sends `opcode` and `payload`, then expects the controller's checksum
    /// word.
    pub fn write(&self, opcode: Opcode, payload: &[Field]) -> Result<()> {
        let verify = self.verify_write_ack;
        self.exchange(opcode, |codec, attempt| {
            if attempt > 1 {
                codec.flush_input()?;
            }
            let sent = codec.send(opcode, payload)?;
            let ack = codec.read_checksum_word()?;
            if ack != sent {
                if verify {
                    return Err(DobotError::CrcMismatch {
                        computed: sent,
                        reported: ack,
                    });
                }
                warn!(
                    "{:?} acknowledged with {:#06x}, sent {:#06x}",
                    opcode.command(),
                    ack,
                    sent
                );
            }
            Ok(())
        })
    }

    /// Sends a bare `opcode` and decodes the response fields with `decode`.
    /// The controller's checksum word must match the accumulated CRC.
    pub fn read<T, F>(&self, opcode: Opcode, decode: F) -> Result<T>
    where
        F: Fn(&mut FrameCodec<CH>) -> Result<T>,
    {
        self.exchange(opcode, |codec, _| {
            codec.flush_input()?;
            codec.send(opcode, &[])?;
            let value = decode(&mut *codec)?;
            codec.verify_checksum()?;
            Ok(value)
        })
    }

    /// Sends `opcode` and `payload`, then expects one status byte and a
    /// matching checksum word.
    pub fn write_read_byte(&self, opcode: Opcode, payload: &[Field]) -> Result<u8> {
        self.exchange(opcode, |codec, _| {
            codec.flush_input()?;
            codec.send(opcode, payload)?;
            let status = codec.read_byte()?;
            codec.verify_checksum()?;
            Ok(status)
        })
    }

    /// Drains whatever the controller is still sending and clears the CRC
    pub fn resync(&self) -> Result<()> {
        let mut codec = self.lock();
        for _ in 0..RESYNC_ROUNDS {
            codec.flush_input()?;
            match codec.read_byte() {
                Ok(_) | Err(DobotError::Timeout) => (),
                Err(e) => return Err(e),
            }
        }
        codec.reset_crc();
        Ok(())
    }

    pub fn flush_input(&self) -> Result<()> {
        self.lock().flush_input()
    }

    pub fn into_channel(self) -> CH {
        self.link
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_channel()
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error or
    /// the attempt budget is spent. The lock is held across all attempts.
    fn exchange<T, F>(&self, opcode: Opcode, mut attempt: F) -> Result<T>
    where
        F: FnMut(&mut FrameCodec<CH>, u8) -> Result<T>,
    {
        let mut codec = self.lock();
        let mut n = 1;
        loop {
            debug!("{:?} attempt {}/{}", opcode.command(), n, self.attempts);
            match attempt(&mut *codec, n) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && n < self.attempts => {
                    warn!("{:?} attempt {} failed: {}", opcode.command(), n, e);
                    n += 1;
                }
                Err(e) => {
                    warn!("{:?} failed after {} attempt(s): {}", opcode.command(), n, e);
                    return Err(e);
                }
            }
        }
    }

    // Every attempt reinitialises the codec, so a poisoned link is usable
    fn lock(&self) -> MutexGuard<'_, FrameCodec<CH>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
