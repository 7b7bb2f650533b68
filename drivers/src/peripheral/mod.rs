//! Peripheral Drivers
//!
//! Register back-ends implementing [`crate::hal::registers::UartRegisters`].
//!
//! # Available Peripherals
//!
//! - [`usart`]: AVR-style memory-mapped USART

pub mod usart;
