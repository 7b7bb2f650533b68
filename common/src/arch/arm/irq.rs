use crate::sync::irq::IrqControl;

const CPSR_I_BIT: u32 = 1 << 7;

/// IRQ masking through the CPSR I bit (ARMv6 and later, A/R profiles).
///
/// `State` is `true` when IRQs were enabled before `disable()`. FIQs are
/// left alone; UART interrupts are routed as IRQs.
pub struct ArmIrq;

impl IrqControl for ArmIrq {
    type State = bool;

    #[inline(always)]
    fn disable() -> bool {
        let cpsr: u32;
        // SAFETY: reading CPSR and setting the I bit has no memory effects.
        unsafe {
            core::arch::asm!(
                "mrs {0}, cpsr",
                "cpsid i",
                out(reg) cpsr,
                options(nomem, nostack)
            );
        }
        cpsr & CPSR_I_BIT == 0
    }

    #[inline(always)]
    fn restore(prev_enabled: bool) {
        if prev_enabled {
            // SAFETY: re-enables IRQs that were enabled when the matching
            // `disable()` ran.
            unsafe {
                core::arch::asm!("cpsie i", options(nomem, nostack));
            }
        }
    }
}
