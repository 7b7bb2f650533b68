use core::sync::atomic::{AtomicBool, Ordering};

use crate::sync::irq::IrqControl;

/// Simulated global interrupt-enable bit.
static IRQ_ENABLED: AtomicBool = AtomicBool::new(true);

/// Interrupt control for hosted builds.
///
/// There is no interrupt hardware to mask, so the state is a single global
/// flag. It behaves like a CPU enable bit: `disable()` clears it and reports
/// whether it was set, `restore()` puts it back.
pub struct HostIrq;

impl HostIrq {
    /// Whether "interrupts" are currently enabled.
    pub fn enabled() -> bool {
        IRQ_ENABLED.load(Ordering::Acquire)
    }
}

impl IrqControl for HostIrq {
    type State = bool;

    #[inline]
    fn disable() -> bool {
        IRQ_ENABLED.swap(false, Ordering::AcqRel)
    }

    #[inline]
    fn restore(prev_enabled: bool) {
        if prev_enabled {
            IRQ_ENABLED.store(true, Ordering::Release);
        }
    }
}
