#![crate_type = "lib"]
#![crate_name = "dobot"]

//! # dobot-rs
//!
//! `dobot-rs` implements the host side of the open-dobot serial protocol
//! spoken by the FPGA motion-controller board of the Dobot arm.
//!
//! Every exchange is a single request/response transaction: an opcode,
//! fixed-width big-endian fields and a trailing CRC16-CCITT word, answered
//! by the controller with its own fields and checksum word.
//!
//! The library does not own the serial port. It requires a struct
//! implementing the [`ByteChannel`] trait; with the `serial` feature
//! enabled, [`serial::SerialChannel`] provides one over a real port.
//!
//! # Examples
//!
//! ```
//! use dobot::{create_driver, ByteChannel, DriverConfig};
//! use std::io;
//! use std::time::Duration;
//!
//! struct NewChannel;
//!
//! impl ByteChannel for NewChannel {
//!     fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
//!         // your implementation
//!         Ok(())
//!     }
//!
//!     fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
//!         // your implementation, Ok(0) when the read timed out
//!         Ok(0)
//!     }
//!
//!     fn flush_input(&mut self) -> io::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let config = DriverConfig::default().with_boot_delay(Duration::ZERO);
//! let driver = create_driver(NewChannel, config).boot();
//!
//! // Nothing answers on this channel, so the probe times out.
//! assert!(driver.ready().is_err());
//! ```
//!
//! The driver is `Sync` when the channel is `Send`: share it behind an
//! `Arc` and every transaction is serialized on the channel.

use std::io;

use thiserror::Error;

pub mod codec;
pub mod command;
pub mod config;
pub mod crc;
pub mod dobot_main;
pub mod encoders;
#[cfg(feature = "serial")]
pub mod serial;
pub mod transaction;

pub use command::{Command, Opcode};
pub use config::DriverConfig;
pub use dobot_main::{create_driver, Accelerometers, Driver, JointCalibration};

/// Number of joints driven by the controller
pub const JOINT_COUNT: usize = 3;

/// Errors of a controller access
#[derive(Debug, Error)]
pub enum DobotError {
    /// A read did not complete within the channel timeout
    #[error("timed out waiting for the controller")]
    Timeout,
    /// The checksum word reported by the controller disagrees with ours
    #[error("checksum mismatch: computed {computed:#06x}, controller reported {reported:#06x}")]
    CrcMismatch { computed: u16, reported: u16 },
    /// Joint index outside 1..=3
    #[error("joint {0} does not exist, expected 1..=3")]
    InvalidJoint(u8),
    /// The command cannot be issued to this controller revision
    #[error("{0:?} is not supported by the controller")]
    Unsupported(Command),
    #[error("channel error: {0}")]
    Io(#[from] io::Error),
}

impl DobotError {
    /// Whether a whole-transaction retry may cure this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, DobotError::Timeout | DobotError::CrcMismatch { .. })
    }
}

pub type Result<T> = core::result::Result<T, DobotError>;

/// Duplex byte stream to the controller.
///
/// Implementations own the physical link (open, close, baud rate, timeout).
pub trait ByteChannel {
    /// Writes the whole buffer to the link
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Reads up to `buf.len()` bytes, blocking up to the configured timeout.
    /// A short read, including `Ok(0)`, means the timeout expired.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Discards every byte already received and not yet read
    fn flush_input(&mut self) -> io::Result<()>;
}

impl<T: ByteChannel + ?Sized> ByteChannel for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn flush_input(&mut self) -> io::Result<()> {
        (**self).flush_input()
    }
}

/// Typestate Booting: the controller may still be resetting
pub struct Booting;
/// Typestate Ready: boot delay elapsed, commands may be issued
pub struct Ready;
