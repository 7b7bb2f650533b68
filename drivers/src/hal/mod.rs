//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! The UART driver never touches silicon directly. Everything it needs from
//! the board is expressed as a trait here and supplied by the integrator.
//!
//! # Available Interfaces
//!
//! - [`serial`]: Line settings and the byte-stream `SerialPort` interface
//! - [`registers`]: Per-peripheral UART register access
//! - [`clock`]: Peripheral clock gating and frequency queries

pub mod clock;
pub mod registers;
pub mod serial;
