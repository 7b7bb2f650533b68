//! Host (non-embedded) target support.
//!
//! Used when the crate is built for a development machine, e.g. for tests.

pub mod irq;
