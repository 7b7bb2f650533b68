use core::fmt::Debug;

/// Architecture-specific interrupt masking interface.
///
/// Implemented by the architecture layer (see [`crate::arch`]).
pub trait IrqControl {
    /// Saved interrupt state
    type State: Copy + Debug;

    /// Disable interrupts and return the previous state.
    fn disable() -> Self::State;

    /// Restore interrupts to a previous state.
    fn restore(state: Self::State);
}

/// Run `f` with interrupts masked, restoring the previous state afterwards.
///
/// Nesting is fine: an inner call sees interrupts already disabled and
/// leaves them that way on exit.
#[inline]
pub fn without_interrupts<I: IrqControl, R>(f: impl FnOnce() -> R) -> R {
    let state = I::disable();
    let result = f();
    I::restore(state);
    result
}
