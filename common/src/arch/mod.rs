//! Architecture selection.
//!
//! [`CpuIrq`] names the interrupt controller of the target the crate is
//! built for.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        pub mod arm;
        pub use arm::irq::ArmIrq as CpuIrq;
    } else {
        pub mod host;
        pub use host::irq::HostIrq as CpuIrq;
    }
}
