//! Peripheral registry.
//!
//! The set of UART instances a firmware image uses is fixed at build time by
//! a `[PortConfig; N]` list. Every listed peripheral gets one [`UartSlot`]
//! holding its buffers and state; anything not listed has no slot, no
//! buffers and no interrupt work.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use common::sync::{IrqControl, IrqSpinLock};

use crate::hal::clock::ClockSource;
use crate::hal::registers::Status;
use crate::hal::serial::SerialConfig;
use crate::ring_buffer::RingBuffer;

/// Hardware instance number of a UART (`0` for UART0/USART0, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeripheralId(pub u8);

impl PeripheralId {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uart{}", self.0)
    }
}

/// Build-time settings of one enabled peripheral.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub id: PeripheralId,
    /// Used when `open` is called without an explicit baud rate.
    pub default_baud: u32,
    pub clock_source: ClockSource,
    pub double_speed: bool,
}

impl PortConfig {
    pub const DEFAULT_BAUD: u32 = 115_200;

    pub const fn new(id: PeripheralId) -> Self {
        Self {
            id,
            default_baud: Self::DEFAULT_BAUD,
            clock_source: ClockSource::Peripheral,
            double_speed: false,
        }
    }

    pub const fn default_baud(mut self, baud: u32) -> Self {
        self.default_baud = baud;
        self
    }

    pub const fn clock_source(mut self, source: ClockSource) -> Self {
        self.clock_source = source;
        self
    }

    pub const fn double_speed(mut self, enabled: bool) -> Self {
        self.double_speed = enabled;
        self
    }

    /// 8N1 line settings at `baud` using this port's clock settings.
    pub const fn serial_config(&self, baud: u32) -> SerialConfig {
        SerialConfig::new_8n1(baud).with_clock(self.clock_source, self.double_speed)
    }
}

/// Lifecycle state of a peripheral.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PortState {
    Closed = 0,
    Open = 1,
    /// The hardware reported a line error; only `close` + `open` recover.
    Error = 2,
}

impl PortState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => PortState::Open,
            2 => PortState::Error,
            _ => PortState::Closed,
        }
    }
}

/// Data direction, for per-direction flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

/// Everything the driver keeps for one enabled peripheral.
///
/// Foreground code is the TX producer and RX consumer; the interrupt
/// handlers are the TX consumer and RX producer.
pub struct UartSlot<I: IrqControl, const TX: usize, const RX: usize> {
    pub(crate) port: PortConfig,
    pub(crate) tx: RingBuffer<I, TX>,
    pub(crate) rx: RingBuffer<I, RX>,
    state: AtomicU8,
    tx_overflow: AtomicBool,
    rx_overflow: AtomicBool,
    line_errors: AtomicU8,
    /// Active line settings. Held across open/close so both run with
    /// interrupts masked.
    pub(crate) session: IrqSpinLock<Option<SerialConfig>, I>,
}

impl<I: IrqControl, const TX: usize, const RX: usize> UartSlot<I, TX, RX> {
    pub const fn new(port: PortConfig) -> Self {
        Self {
            port,
            tx: RingBuffer::new(),
            rx: RingBuffer::new(),
            state: AtomicU8::new(PortState::Closed as u8),
            tx_overflow: AtomicBool::new(false),
            rx_overflow: AtomicBool::new(false),
            line_errors: AtomicU8::new(0),
            session: IrqSpinLock::new(None),
        }
    }

    pub fn id(&self) -> PeripheralId {
        self.port.id
    }

    pub fn port(&self) -> &PortConfig {
        &self.port
    }

    pub fn state(&self) -> PortState {
        PortState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: PortState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.state() == PortState::Open
    }

    pub fn overflow(&self, direction: Direction) -> bool {
        self.overflow_flag(direction).load(Ordering::Acquire)
    }

    pub(crate) fn set_overflow(&self, direction: Direction) {
        self.overflow_flag(direction).store(true, Ordering::Release);
    }

    pub fn clear_overflow(&self, direction: Direction) {
        self.overflow_flag(direction).store(false, Ordering::Release);
    }

    fn overflow_flag(&self, direction: Direction) -> &AtomicBool {
        match direction {
            Direction::Tx => &self.tx_overflow,
            Direction::Rx => &self.rx_overflow,
        }
    }

    pub fn line_errors(&self) -> Status {
        Status::from_bits_truncate(self.line_errors.load(Ordering::Acquire))
    }

    /// Latch `errors` and move an open port into the error state.
    ///
    /// Runs in interrupt context.
    pub(crate) fn fault(&self, errors: Status) {
        self.line_errors.fetch_or(errors.bits(), Ordering::AcqRel);
        // Only Open -> Error; a closed port stays closed.
        let _ = self.state.compare_exchange(
            PortState::Open as u8,
            PortState::Error as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Empty both buffers and clear all flags. Caller holds `session`.
    pub(crate) fn reset_buffers(&self) {
        self.tx.clear();
        self.rx.clear();
        self.tx_overflow.store(false, Ordering::Release);
        self.rx_overflow.store(false, Ordering::Release);
        self.line_errors.store(0, Ordering::Release);
    }
}

/// Static table of enabled peripherals.
pub struct Registry<I: IrqControl, const N: usize, const TX: usize, const RX: usize> {
    slots: [UartSlot<I, TX, RX>; N],
}

impl<I: IrqControl, const N: usize, const TX: usize, const RX: usize> Registry<I, N, TX, RX> {
    /// Build the registry from the list of enabled ports.
    ///
    /// Panics (at compile time when used in a `static`) on duplicate ids or
    /// a zero default baud rate.
    pub const fn new(ports: [PortConfig; N]) -> Self {
        let mut i = 0;
        while i < N {
            assert!(ports[i].default_baud > 0, "default baud rate must be non-zero");
            let mut j = i + 1;
            while j < N {
                assert!(ports[i].id.0 != ports[j].id.0, "peripheral listed twice");
                j += 1;
            }
            i += 1;
        }

        let mut slots = [const { UartSlot::<I, TX, RX>::new(PortConfig::new(PeripheralId(0))) }; N];
        let mut k = 0;
        while k < N {
            slots[k].port = ports[k];
            k += 1;
        }

        Self { slots }
    }

    pub fn get(&self, id: PeripheralId) -> Option<&UartSlot<I, TX, RX>> {
        self.slots.iter().find(|slot| slot.port.id == id)
    }

    pub fn contains(&self, id: PeripheralId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UartSlot<I, TX, RX>> {
        self.slots.iter()
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Return every slot to `Closed` with empty buffers. No hardware access.
    pub fn reset(&self) {
        for slot in &self.slots {
            let mut session = slot.session.lock();
            *session = None;
            slot.reset_buffers();
            slot.set_state(PortState::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::arch::host::irq::HostIrq;

    const PORTS: [PortConfig; 2] = [
        PortConfig::new(PeripheralId(0)).default_baud(9_600),
        PortConfig::new(PeripheralId(2)).double_speed(true),
    ];

    static REGISTRY: Registry<HostIrq, 2, 16, 8> = Registry::new(PORTS);

    #[test]
    fn test_only_listed_ports_have_slots() {
        assert!(REGISTRY.contains(PeripheralId(0)));
        assert!(!REGISTRY.contains(PeripheralId(1)));
        assert!(REGISTRY.contains(PeripheralId(2)));
        assert_eq!(REGISTRY.len(), 2);

        let slot = REGISTRY.get(PeripheralId(2)).unwrap();
        assert!(slot.port().double_speed);
        assert_eq!(slot.port().default_baud, PortConfig::DEFAULT_BAUD);
        assert_eq!(slot.tx.capacity(), 16);
        assert_eq!(slot.rx.capacity(), 8);
    }

    #[test]
    fn test_fault_only_moves_open_ports() {
        let registry: Registry<HostIrq, 1, 4, 4> = Registry::new([PortConfig::new(PeripheralId(3))]);
        let slot = registry.get(PeripheralId(3)).unwrap();

        slot.fault(Status::OVERRUN);
        assert_eq!(slot.state(), PortState::Closed);

        slot.set_state(PortState::Open);
        slot.fault(Status::FRAMING_ERROR);
        assert_eq!(slot.state(), PortState::Error);
        assert_eq!(slot.line_errors(), Status::OVERRUN | Status::FRAMING_ERROR);
    }

    #[test]
    fn test_reset_clears_everything() {
        let registry: Registry<HostIrq, 1, 4, 4> = Registry::new([PortConfig::new(PeripheralId(0))]);
        let slot = registry.get(PeripheralId(0)).unwrap();

        slot.set_state(PortState::Open);
        slot.set_overflow(Direction::Rx);
        // SAFETY: single-threaded test, only producer.
        assert!(unsafe { slot.tx.producer() }.try_push(1));
        *slot.session.lock() = Some(SerialConfig::default());

        registry.reset();

        assert_eq!(slot.state(), PortState::Closed);
        assert!(!slot.overflow(Direction::Rx));
        assert!(slot.tx.is_empty());
        assert!(slot.session.lock().is_none());
    }

    #[test]
    fn test_overflow_flags_are_per_direction() {
        let registry: Registry<HostIrq, 1, 4, 4> = Registry::new([PortConfig::new(PeripheralId(0))]);
        let slot = registry.get(PeripheralId(0)).unwrap();

        slot.set_overflow(Direction::Tx);
        assert!(slot.overflow(Direction::Tx));
        assert!(!slot.overflow(Direction::Rx));

        slot.clear_overflow(Direction::Tx);
        assert!(!slot.overflow(Direction::Tx));
    }
}
