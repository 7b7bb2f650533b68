use core::{
    marker::PhantomData,
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
};

use spin::{Mutex, MutexGuard};

use super::irq::IrqControl;

/// IRQ-safe spinlock.
///
/// - Disables interrupts on lock
/// - Spins until acquired
/// - Restores interrupt state on drop
///
/// Holding the guard keeps interrupt handlers on this core out, so data
/// that an ISR also touches can be reset consistently under it.
///
/// Not fair. Not reentrant.
pub struct IrqSpinLock<T, I: IrqControl> {
    inner: Mutex<T>,
    _irq: PhantomData<I>,
}

impl<T, I: IrqControl> IrqSpinLock<T, I> {
    /// Create a new IRQ-safe spinlock.
    pub const fn new(data: T) -> Self {
        Self {
            inner: Mutex::new(data),
            _irq: PhantomData,
        }
    }

    /// Acquire the lock with interrupts disabled.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T, I> {
        // Mask first so an ISR cannot preempt us while we hold the lock.
        let irq_state = I::disable();
        let guard = self.inner.lock();

        IrqSpinLockGuard {
            guard: ManuallyDrop::new(guard),
            irq_state,
        }
    }

    /// Try to acquire the lock once. Interrupts are left untouched on failure.
    pub fn try_lock(&self) -> Option<IrqSpinLockGuard<'_, T, I>> {
        let irq_state = I::disable();
        match self.inner.try_lock() {
            Some(guard) => Some(IrqSpinLockGuard {
                guard: ManuallyDrop::new(guard),
                irq_state,
            }),
            None => {
                I::restore(irq_state);
                None
            }
        }
    }
}

/// Guard returned by `IrqSpinLock::lock`.
///
/// Restores interrupt state on drop.
pub struct IrqSpinLockGuard<'a, T, I: IrqControl> {
    guard: ManuallyDrop<MutexGuard<'a, T>>,
    irq_state: I::State,
}

impl<T, I: IrqControl> Deref for IrqSpinLockGuard<'_, T, I> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T, I: IrqControl> DerefMut for IrqSpinLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<T, I: IrqControl> Drop for IrqSpinLockGuard<'_, T, I> {
    fn drop(&mut self) {
        // Release lock first
        // SAFETY: `guard` is never touched again after this point.
        unsafe { ManuallyDrop::drop(&mut self.guard) };

        // Restore IRQ state
        I::restore(self.irq_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::host::irq::HostIrq;

    #[test]
    fn test_lock_masks_interrupts_until_dropped() {
        let lock: IrqSpinLock<u32, HostIrq> = IrqSpinLock::new(0);

        {
            let mut guard = lock.lock();
            *guard += 1;
            assert!(!HostIrq::enabled());

            // Not reentrant; a second attempt fails and leaves IRQs masked.
            assert!(lock.try_lock().is_none());
            assert!(!HostIrq::enabled());
        }
        assert!(HostIrq::enabled());

        let guard = lock.try_lock().unwrap();
        assert_eq!(*guard, 1);
        drop(guard);
        assert!(HostIrq::enabled());
    }
}
