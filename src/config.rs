use std::time::Duration;

/// Controller reset-on-connect time before it answers
pub const DEFAULT_BOOT_DELAY: Duration = Duration::from_secs(2);
/// Per-read timeout of the serial link
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(25);
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Driver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Whole-transaction attempts, the first try included, never less than 1
    pub attempts: u8,
    pub boot_delay: Duration,
    pub read_timeout: Duration,
    pub baud_rate: u32,
    /// Compare the checksum word echoed after a write with the CRC sent
    pub verify_write_ack: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            attempts: 1,
            boot_delay: DEFAULT_BOOT_DELAY,
            read_timeout: DEFAULT_READ_TIMEOUT,
            baud_rate: DEFAULT_BAUD_RATE,
            verify_write_ack: false,
        }
    }
}

impl DriverConfig {
    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_boot_delay(mut self, boot_delay: Duration) -> Self {
        self.boot_delay = boot_delay;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_verify_write_ack(mut self, verify: bool) -> Self {
        self.verify_write_ack = verify;
        self
    }

    /// Attempts per transaction, honouring the minimum of one even when
    /// `attempts` was set directly
    pub fn attempts(&self) -> u8 {
        self.attempts.max(1)
    }
}
