//! [`ByteChannel`] over a serial port.

use std::io::{self, Read, Write};

use serialport::{ClearBuffer, SerialPort};

use crate::{ByteChannel, DriverConfig, Result};

pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Opens `path` with the baud rate and read timeout of `config`.
    ///
    /// The controller resets on connection; boot the driver before the
    /// first command.
    pub fn open(path: &str, config: &DriverConfig) -> Result<Self> {
        let port = serialport::new(path, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .map_err(io::Error::from)?;
        log::debug!("opened {} at {} baud", path, config.baud_rate);
        Ok(SerialChannel { port })
    }
}

impl ByteChannel for SerialChannel {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)?;
        Write::flush(&mut self.port)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match Read::read(&mut self.port, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn flush_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}
