//! Driver error kinds.

use thiserror::Error;

use crate::hal::registers::Status;
use crate::registry::PeripheralId;

/// Errors reported by the UART driver.
///
/// The driver never retries on its own; every error is handed back to the
/// caller, who decides how to recover.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum UartError {
    /// The peripheral is not part of the configured registry.
    #[error("peripheral {0} is not enabled")]
    InvalidPeripheral(PeripheralId),

    /// The requested line settings cannot be programmed into the hardware.
    #[error("unsupported line configuration")]
    InvalidConfig,

    /// The handle is closed, unbound, or has faulted.
    #[error("handle is not open")]
    NotOpen,

    /// Data was dropped because a buffer was full.
    ///
    /// The driver itself never returns this; overflow is a sticky flag read
    /// through [`UartDriver::overflow`](crate::UartDriver::overflow). Callers
    /// that want to fail on lost data raise it themselves.
    #[error("buffer overflow")]
    Overflow,

    /// The hardware reported framing, parity or overrun errors.
    #[error("line error: {0:?}")]
    HardwareFault(Status),

    /// A non-blocking operation could not make progress.
    #[error("operation would block")]
    WouldBlock,
}

pub type Result<T> = core::result::Result<T, UartError>;
