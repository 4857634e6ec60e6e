//! Conversions between physical quantities and the integers the controller
//! consumes or reports.

use std::f64::consts::{FRAC_PI_2, PI};

/// Command value meaning "no motion"
pub const IDLE_CMD_VAL: u32 = 0x0242_F000;

/// Timer ticks per 20 ms control interval
const STEP_INTERVAL_TICKS: u32 = 500_000;
/// Stepper timer clock in Hz
const STEP_TIMER_HZ: u32 = 25_000_000;

/// Accelerometer counts per unit of gravity
pub const ACCEL_COUNTS_PER_G: f64 = 493.56;

/// Mirrors all 32 bits: bit 0 becomes bit 31
pub fn reverse_bits32(value: u32) -> u32 {
    value.reverse_bits()
}

/// Timer-compare reciprocal for `steps` steps per 20 ms interval, before
/// bit reversal. `None` for zero steps.
pub fn steps_reciprocal(steps: u32) -> Option<u32> {
    STEP_INTERVAL_TICKS.checked_div(steps)
}

/// Timer-compare reciprocal for a stepping frequency in Hz, before bit
/// reversal. `None` for zero frequency.
pub fn freq_reciprocal(freq: u32) -> Option<u32> {
    STEP_TIMER_HZ.checked_div(freq)
}

/// Converts a number of steps to do in 20 ms into the command value that
/// sets the joint's stepping frequency
pub fn steps_to_cmd_val(steps: u32) -> u32 {
    steps_reciprocal(steps).map_or(IDLE_CMD_VAL, reverse_bits32)
}

/// Converts a stepping frequency in Hz into a command value
pub fn freq_to_cmd_val(freq: u32) -> u32 {
    freq_reciprocal(freq).map_or(IDLE_CMD_VAL, reverse_bits32)
}

/// Tilt of a raw accelerometer reading, in radians.
///
/// Readings beyond one g of the offset saturate to pi/2 instead of failing.
pub fn accel_to_radians(raw: f64, offset: f64) -> f64 {
    let ratio = (raw - offset) / ACCEL_COUNTS_PER_G;
    if (-1.0..=1.0).contains(&ratio) {
        ratio.asin()
    } else {
        FRAC_PI_2
    }
}

/// Tilt of a raw accelerometer reading, in degrees
pub fn accel_to_angle(raw: f64, offset: f64) -> f64 {
    accel_to_radians(raw, offset) * (180.0 / PI)
}
