//! UART register access collaborator.
//!
//! Register layouts differ per silicon vendor. The driver talks to this trait
//! only, passing the peripheral id with every access so one implementation
//! can serve all instances on a chip.

use bitflags::bitflags;

use crate::baud::Oversampling;
use crate::hal::serial::{DataBits, Parity, StopBits};
use crate::registry::PeripheralId;

bitflags! {
    /// Line status as reported by the hardware.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// Receive data register holds a byte.
        const RX_READY = 1 << 0;
        /// Transmit data register can accept a byte.
        const TX_EMPTY = 1 << 1;
        /// Shift register is idle and the data register is empty.
        const TX_COMPLETE = 1 << 2;
        /// Stop bit missing on the last received frame.
        const FRAMING_ERROR = 1 << 3;
        /// Parity check failed on the last received frame.
        const PARITY_ERROR = 1 << 4;
        /// A received byte was lost before it could be read.
        const OVERRUN = 1 << 5;

        /// All conditions that put a handle into the error state.
        const LINE_ERRORS = Self::FRAMING_ERROR.bits()
            | Self::PARITY_ERROR.bits()
            | Self::OVERRUN.bits();
    }
}

/// Shape of one character frame on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameFormat {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

/// Everything needed to program a peripheral for a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineConfig {
    /// Value for the baud-rate divisor register.
    pub divisor: u32,
    pub oversampling: Oversampling,
    pub format: FrameFormat,
}

/// Register-level access to the UART peripherals of a chip.
///
/// Methods take `&self`: implementations either perform volatile MMIO
/// accesses or use interior mutability, and must be callable from both the
/// foreground and interrupt context.
pub trait UartRegisters {
    /// Largest value the divisor register can hold.
    const MAX_DIVISOR: u32 = 0x0FFF;

    /// Program divisor, oversampling and frame format, and enable the
    /// transmitter and receiver. Interrupts stay as they are.
    fn configure(&self, port: PeripheralId, line: &LineConfig);

    /// Whether this hardware can produce `format`.
    fn supports(&self, port: PeripheralId, format: &FrameFormat) -> bool {
        let _ = (port, format);
        true
    }

    /// Read the receive data register. Clears the data-available condition.
    fn read_data(&self, port: PeripheralId) -> u8;

    /// Write the transmit data register.
    fn write_data(&self, port: PeripheralId, byte: u8);

    /// Enable or disable the receive-data-available interrupt.
    fn set_rx_interrupt(&self, port: PeripheralId, enabled: bool);

    /// Enable or disable the transmit-register-empty interrupt.
    fn set_tx_interrupt(&self, port: PeripheralId, enabled: bool);

    /// Current line status.
    fn status(&self, port: PeripheralId) -> Status;
}
