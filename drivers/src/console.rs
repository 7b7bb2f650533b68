//! Byte-stream adapter.
//!
//! [`Port`] pairs a driver with one handle and exposes it through the HAL
//! [`SerialPort`] traits, so anything written against those traits (and
//! `core::fmt` via [`SerialWriter`]) can run on an interrupt-driven UART:
//!
//! ```ignore
//! use core::fmt::Write;
//!
//! let port = Port::open(&UART, PeripheralId(0), None)?;
//! let mut console = SerialWriter(port);
//! writeln!(console, "boot: {} Hz", clock_hz)?;
//! ```

use common::sync::IrqControl;

use crate::error::{Result, UartError};
use crate::hal::clock::ClockControl;
use crate::hal::registers::UartRegisters;
use crate::hal::serial::{NonBlockingSerial, SerialConfig, SerialPort};
use crate::registry::PeripheralId;
use crate::uart::{UartDriver, UartHandle};

/// One peripheral of a [`UartDriver`], seen as a [`SerialPort`].
pub struct Port<'a, R, C, I, const N: usize, const TX: usize, const RX: usize>
where
    R: UartRegisters,
    C: ClockControl,
    I: IrqControl,
{
    driver: &'a UartDriver<R, C, I, N, TX, RX>,
    id: PeripheralId,
    handle: UartHandle,
}

impl<'a, R, C, I, const N: usize, const TX: usize, const RX: usize> Port<'a, R, C, I, N, TX, RX>
where
    R: UartRegisters,
    C: ClockControl,
    I: IrqControl,
{
    /// Bind to `id` without opening it; call [`SerialPort::configure`] next.
    pub fn new(driver: &'a UartDriver<R, C, I, N, TX, RX>, id: PeripheralId) -> Self {
        Self {
            driver,
            id,
            handle: UartHandle::new(),
        }
    }

    /// Bind to `id` and open it as 8N1 at `baud` (or the port default).
    pub fn open(driver: &'a UartDriver<R, C, I, N, TX, RX>, id: PeripheralId, baud: Option<u32>) -> Result<Self> {
        let mut port = Self::new(driver, id);
        driver.open(&mut port.handle, id, baud)?;
        Ok(port)
    }

    pub fn id(&self) -> PeripheralId {
        self.id
    }

    pub fn handle(&self) -> &UartHandle {
        &self.handle
    }

    pub fn close(self) -> Result<()> {
        self.driver.close(&self.handle)
    }
}

impl<R, C, I, const N: usize, const TX: usize, const RX: usize> SerialPort for Port<'_, R, C, I, N, TX, RX>
where
    R: UartRegisters,
    C: ClockControl,
    I: IrqControl,
{
    type Error = UartError;

    fn configure(&mut self, config: SerialConfig) -> Result<()> {
        self.driver.open_with(&mut self.handle, self.id, config)
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.driver.write(&self.handle, byte)
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.driver.read(&self.handle)
    }

    fn flush(&mut self) -> Result<()> {
        self.driver.flush_tx(&self.handle)
    }

    fn is_busy(&self) -> bool {
        self.driver.tx_busy(&self.handle).unwrap_or(false)
    }
}

impl<R, C, I, const N: usize, const TX: usize, const RX: usize> NonBlockingSerial for Port<'_, R, C, I, N, TX, RX>
where
    R: UartRegisters,
    C: ClockControl,
    I: IrqControl,
{
    fn try_write_byte(&mut self, byte: u8) -> Result<()> {
        if self.driver.write_nonblocking(&self.handle, byte)? {
            Ok(())
        } else {
            Err(UartError::WouldBlock)
        }
    }

    fn try_read_byte(&mut self) -> Result<u8> {
        self.driver
            .read_nonblocking(&self.handle)?
            .ok_or(UartError::WouldBlock)
    }
}
