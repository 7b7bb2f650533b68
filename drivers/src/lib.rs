//! Interrupt-Driven UART Driver
//!
//! Buffered, handle-based serial I/O for microcontrollers with several UART
//! instances. Foreground code and interrupt handlers share one TX and one RX
//! ring per peripheral without locks: each ring has exactly one producer and
//! one consumer, and only the code that reads both indices masks interrupts.
//!
//! # Module Organization
//!
//! - [`hal`]: Traits for the board collaborators (registers, clocks) and
//!   line settings
//! - [`ring_buffer`]: Single-producer/single-consumer byte ring
//! - [`baud`]: Baud-rate divisor calculation
//! - [`registry`]: Build-time table of enabled peripherals
//! - [`uart`]: The driver: open/close, read/write, flush
//! - [`interrupt`]: Interrupt entry points
//! - [`console`]: `SerialPort` / `core::fmt` adapter
//! - [`peripheral`]: Register back-ends for specific silicon
//!
//! # Usage Example
//!
//! ```ignore
//! use uart::{PeripheralId, PortConfig, UartDriver, UartHandle};
//! use uart::peripheral::usart::{Usart, ATMEGA2560_BASES};
//!
//! const PORTS: [PortConfig; 2] = [
//!     PortConfig::new(PeripheralId(0)).default_baud(115_200).double_speed(true),
//!     PortConfig::new(PeripheralId(2)).default_baud(9_600),
//! ];
//!
//! static UART: UartDriver<Usart<CpuIrq, 4>, BoardClock, CpuIrq, 2, 64, 32> =
//!     UartDriver::new(PORTS, unsafe { Usart::new(ATMEGA2560_BASES) }, BoardClock);
//!
//! let mut console = UartHandle::new();
//! UART.init();
//! UART.open(&mut console, PeripheralId(0), None)?;
//! UART.write_all(&console, b"Hello, world!\r\n")?;
//! ```

#![cfg_attr(not(test), no_std)]

pub mod baud;
pub mod console;
pub mod error;
pub mod hal;
pub mod interrupt;
pub mod peripheral;
pub mod registry;
pub mod ring_buffer;
pub mod uart;

// Re-export commonly used types
pub use baud::{BaudRate, Oversampling};
pub use common::sync::IrqControl;
pub use console::Port;
pub use error::{Result, UartError};
pub use hal::clock::{ClockControl, ClockSource};
pub use hal::registers::{FrameFormat, LineConfig, Status, UartRegisters};
pub use hal::serial::{DataBits, NonBlockingSerial, Parity, SerialConfig, SerialPort, SerialWriter, StopBits};
pub use registry::{Direction, PeripheralId, PortConfig, PortState, Registry};
pub use uart::{UartDriver, UartHandle};
