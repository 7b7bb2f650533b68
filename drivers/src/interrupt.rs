//! Interrupt entry points.
//!
//! Board code wires its UART vectors to these methods:
//!
//! ```ignore
//! #[interrupt]
//! fn USART0_RX() {
//!     UART.on_rx_ready(PeripheralId(0));
//! }
//!
//! #[interrupt]
//! fn USART0_UDRE() {
//!     UART.on_tx_empty(PeripheralId(0));
//! }
//! ```
//!
//! Hardware with a single vector per UART calls [`UartDriver::on_interrupt`]
//! instead. The handlers are not reentrant for a given peripheral; the
//! interrupt controller masks a vector while it runs. They never block and
//! never log.

use common::sync::IrqControl;

use crate::hal::clock::ClockControl;
use crate::hal::registers::{Status, UartRegisters};
use crate::registry::{Direction, PeripheralId, PortState};
use crate::uart::UartDriver;

impl<R, C, I, const N: usize, const TX: usize, const RX: usize> UartDriver<R, C, I, N, TX, RX>
where
    R: UartRegisters,
    C: ClockControl,
    I: IrqControl,
{
    /// Receive-data-available handler.
    ///
    /// The data register is read exactly once per call, whatever happens to
    /// the byte afterwards, since the read is what acknowledges the
    /// interrupt.
    pub fn on_rx_ready(&self, id: PeripheralId) {
        let Some(slot) = self.registry.get(id) else {
            return;
        };

        let status = self.regs.status(id);
        let byte = self.regs.read_data(id);

        let errors = status & Status::LINE_ERRORS;
        if !errors.is_empty() {
            slot.fault(errors);
            return;
        }
        if !slot.is_open() {
            return;
        }

        // SAFETY: this handler is the only RX producer.
        if !unsafe { slot.rx.producer() }.try_push(byte) {
            slot.set_overflow(Direction::Rx);
        }
    }

    /// Transmit-data-register-empty handler.
    ///
    /// Sends the next queued byte, or switches the interrupt off when there
    /// is nothing left. `write` switches it back on.
    pub fn on_tx_empty(&self, id: PeripheralId) {
        let Some(slot) = self.registry.get(id) else {
            return;
        };

        if slot.state() == PortState::Closed {
            self.regs.set_tx_interrupt(id, false);
            return;
        }

        // SAFETY: this handler is the only TX consumer.
        let mut tx = unsafe { slot.tx.consumer() };
        match tx.try_pop() {
            Some(byte) => self.regs.write_data(id, byte),
            None => {
                self.regs.set_tx_interrupt(id, false);
                // A writer on another core may have queued a byte and enabled
                // the interrupt just before we disabled it.
                if !tx.is_empty() {
                    self.regs.set_tx_interrupt(id, true);
                }
            }
        }
    }

    /// Shared-vector handler: services whichever conditions are pending.
    pub fn on_interrupt(&self, id: PeripheralId) {
        let status = self.regs.status(id);

        if status.intersects(Status::RX_READY | Status::LINE_ERRORS) {
            self.on_rx_ready(id);
        }
        if status.contains(Status::TX_EMPTY) {
            self.on_tx_empty(id);
        }
    }
}
