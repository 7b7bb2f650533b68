//! Baud-rate divisor calculation.
//!
//! The generator divides the peripheral clock by `oversample × (divisor + 1)`:
//!
//! ```text
//! divisor   = round(clock / (oversample × baud)) - 1
//! effective = clock / (oversample × (divisor + 1))
//! ```
//!
//! Oversampling is a static choice made by the caller through the
//! double-speed flag. 8x halves the clock per bit and often lands closer to
//! the target at high baud rates, at the cost of receiver noise tolerance:
//!
//! | clock  | baud   | mode | divisor | error  |
//! |--------|--------|------|---------|--------|
//! | 16 MHz | 115200 | 16x  | 8       | -3.5 % |
//! | 16 MHz | 115200 | 8x   | 16      | +2.1 % |

use crate::error::{Result, UartError};

/// Receiver samples per bit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Oversampling {
    /// Normal mode.
    X16,
    /// Double-speed mode.
    X8,
}

impl Oversampling {
    pub const fn from_double_speed(double_speed: bool) -> Self {
        if double_speed { Oversampling::X8 } else { Oversampling::X16 }
    }

    pub const fn factor(self) -> u32 {
        match self {
            Oversampling::X16 => 16,
            Oversampling::X8 => 8,
        }
    }
}

/// Result of a divisor calculation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BaudRate {
    /// Value for the divisor register.
    pub divisor: u32,
    /// Baud rate the hardware will actually produce.
    pub effective: u32,
    /// Signed relative error, `(effective - target) / target`, in parts per
    /// million.
    pub error_ppm: i32,
}

impl BaudRate {
    /// Compute the divisor for `baud` from a `clock_hz` source.
    ///
    /// Fails with [`UartError::InvalidConfig`] when the baud rate is zero,
    /// faster than the clock allows, or needs a divisor above `max_divisor`.
    pub fn compute(clock_hz: u32, baud: u32, oversampling: Oversampling, max_divisor: u32) -> Result<Self> {
        if baud == 0 {
            return Err(UartError::InvalidConfig);
        }

        let clock = clock_hz as u64;
        let per_bit = oversampling.factor() as u64 * baud as u64;

        if clock < per_bit {
            return Err(UartError::InvalidConfig);
        }

        // clock >= per_bit, so the rounded quotient is at least 1
        let steps = (clock + per_bit / 2) / per_bit;
        let divisor = steps - 1;

        if divisor > max_divisor as u64 {
            return Err(UartError::InvalidConfig);
        }

        let effective = clock / (oversampling.factor() as u64 * steps);
        let error_ppm = relative_error_ppm(effective as i64, baud as i64);

        Ok(Self {
            divisor: divisor as u32,
            effective: effective as u32,
            error_ppm,
        })
    }

    /// Magnitude of the error, `|effective - target| / target`, in ppm.
    pub fn abs_error_ppm(&self) -> u32 {
        self.error_ppm.unsigned_abs()
    }
}

/// `(actual - target) / target` in ppm, rounded half away from zero.
fn relative_error_ppm(actual: i64, target: i64) -> i32 {
    let scaled = (actual - target) * 1_000_000;
    let half = target / 2;
    let rounded = if scaled >= 0 {
        (scaled + half) / target
    } else {
        (scaled - half) / target
    };
    rounded as i32
}
