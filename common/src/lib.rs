//! Architecture glue shared by the driver crates.
//!
//! - [`sync`]: interrupt masking and IRQ-safe locking
//! - [`arch`]: per-architecture [`sync::irq::IrqControl`] implementations

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod sync;
