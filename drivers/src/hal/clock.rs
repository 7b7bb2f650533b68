//! Clock tree collaborator.

use crate::registry::PeripheralId;

/// Clock feeding a UART's baud-rate generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ClockSource {
    /// Peripheral bus clock.
    #[default]
    Peripheral,
    /// Core system clock.
    System,
    /// High-speed internal oscillator.
    HighSpeedInternal,
    /// Low-speed external crystal (typically 32.768 kHz).
    LowSpeedExternal,
}

/// Access to the board's clock tree.
///
/// Clock-tree bring-up happens elsewhere; the driver only asks how fast a
/// source runs and gates the clock of the peripherals it opens.
pub trait ClockControl {
    /// Frequency of `source` in Hz.
    fn frequency(&self, source: ClockSource) -> u32;

    /// Ungate the clock of `port`.
    fn enable(&self, port: PeripheralId);

    /// Gate the clock of `port`.
    fn disable(&self, port: PeripheralId);
}
