//! Interrupt-driven UART driver.
//!
//! Foreground code queues bytes into a per-peripheral TX ring and enables the
//! TX-empty interrupt; the handler in [`crate::interrupt`] drains the ring
//! into the data register and disables itself once it runs dry. Received
//! bytes flow the other way.
//!
//! # Blocking
//!
//! There is no scheduler to suspend a caller on. [`UartDriver::write`],
//! [`UartDriver::read`] and [`UartDriver::flush_tx`] busy-wait with
//! interrupts enabled until the interrupt handler makes room, delivers data
//! or the line goes idle. Each spin re-checks the handle state, so closing
//! the port or a line fault ends the wait with [`UartError::NotOpen`].
//! Callers needing a timeout poll the `_nonblocking` variants instead.
//!
//! # Example
//!
//! ```ignore
//! let mut console = UartHandle::new();
//! UART.open(&mut console, PeripheralId(0), None)?;
//! UART.write_all(&console, b"Hello, world!\r\n")?;
//! UART.flush_tx(&console)?;
//! ```

use common::sync::IrqControl;
use log::{debug, warn};

use crate::baud::{BaudRate, Oversampling};
use crate::error::{Result, UartError};
use crate::hal::clock::ClockControl;
use crate::hal::registers::{FrameFormat, LineConfig, Status, UartRegisters};
use crate::hal::serial::{DataBits, Parity, SerialConfig, StopBits};
use crate::registry::{Direction, PeripheralId, PortConfig, PortState, Registry, UartSlot};

/// Caller-side reference to one peripheral.
///
/// A fresh handle is unbound; a successful open binds it. Operations on an
/// unbound, closed or faulted handle fail with [`UartError::NotOpen`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct UartHandle {
    port: Option<PeripheralId>,
}

impl UartHandle {
    pub const fn new() -> Self {
        Self { port: None }
    }

    /// Peripheral this handle was last opened on.
    pub fn port(&self) -> Option<PeripheralId> {
        self.port
    }
}

/// UART driver for every peripheral listed in its registry.
///
/// Designed to live in a `static` so the interrupt vectors can reach it:
///
/// ```ignore
/// static UART: UartDriver<Usart<CpuIrq, 2>, BoardClock, CpuIrq, 2, 64, 64> =
///     UartDriver::new(PORTS, unsafe { Usart::new(BASES) }, BoardClock);
/// ```
pub struct UartDriver<R, C, I, const N: usize, const TX: usize, const RX: usize>
where
    R: UartRegisters,
    C: ClockControl,
    I: IrqControl,
{
    pub(crate) registry: Registry<I, N, TX, RX>,
    pub(crate) regs: R,
    clock: C,
}

impl<R, C, I, const N: usize, const TX: usize, const RX: usize> UartDriver<R, C, I, N, TX, RX>
where
    R: UartRegisters,
    C: ClockControl,
    I: IrqControl,
{
    pub const fn new(ports: [PortConfig; N], regs: R, clock: C) -> Self {
        Self {
            registry: Registry::new(ports),
            regs,
            clock,
        }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn registry(&self) -> &Registry<I, N, TX, RX> {
        &self.registry
    }

    /// Reset every port to `Closed` with empty buffers.
    ///
    /// Touches no hardware, so it is safe to call before clocks are up and
    /// as often as needed.
    pub fn init(&self) {
        self.registry.reset();
        debug!("uart: {} port(s) registered", N);
    }

    // ------------------------------------------------------------------
    // Open / close
    // ------------------------------------------------------------------

    /// Open `id` as 8N1 at `baud`, or at the port's default baud for `None`.
    pub fn open(&self, handle: &mut UartHandle, id: PeripheralId, baud: Option<u32>) -> Result<()> {
        self.open_checked(handle, id, |port| {
            Ok(port.serial_config(baud.unwrap_or(port.default_baud)))
        })
    }

    /// Open `id` with an explicit frame format.
    ///
    /// `data_bits` must be 5..=9 and `stop_bits` 1 or 2.
    pub fn open2(
        &self,
        handle: &mut UartHandle,
        id: PeripheralId,
        baud: u32,
        data_bits: u8,
        parity: Parity,
        stop_bits: u8,
    ) -> Result<()> {
        self.open_checked(handle, id, |port| {
            let data_bits = DataBits::try_from(data_bits)?;
            let stop_bits = StopBits::try_from(stop_bits)?;
            Ok(port.serial_config(baud).with_format(data_bits, parity, stop_bits))
        })
    }

    /// Open `id` with fully specified line settings.
    ///
    /// Whatever `handle` had open is closed first, as is `id` itself if
    /// another handle holds it. On failure the handle is left unbound and the
    /// port closed.
    pub fn open_with(&self, handle: &mut UartHandle, id: PeripheralId, config: SerialConfig) -> Result<()> {
        self.open_checked(handle, id, |_| Ok(config))
    }

    /// Shared open path. `build` runs after the implicit close, so a rejected
    /// parameter leaves the same state as a rejected baud rate.
    fn open_checked<F>(&self, handle: &mut UartHandle, id: PeripheralId, build: F) -> Result<()>
    where
        F: FnOnce(&PortConfig) -> Result<SerialConfig>,
    {
        let slot = self.lookup(id)?;

        if let Some(previous) = handle.port.take().and_then(|prev| self.registry.get(prev)) {
            if previous.state() != PortState::Closed {
                self.shutdown(previous);
            }
        }
        if slot.state() != PortState::Closed {
            self.shutdown(slot);
        }

        let config = build(slot.port()).inspect_err(|_| warn!("{}: invalid line parameters", id))?;
        let line = self.line_config(id, &config)?;

        {
            let mut session = slot.session.lock();

            self.clock.enable(id);
            self.regs.set_tx_interrupt(id, false);
            self.regs.set_rx_interrupt(id, false);
            self.regs.configure(id, &line);

            slot.reset_buffers();
            *session = Some(config);
            slot.set_state(PortState::Open);

            // TX-empty stays off until something is queued.
            self.regs.set_rx_interrupt(id, true);
        }

        handle.port = Some(id);
        debug!(
            "{}: open {} baud {}{}{} divisor={} {:?}",
            id,
            config.baud_rate,
            config.data_bits.count(),
            parity_char(config.parity),
            stop_count(config.stop_bits),
            line.divisor,
            line.oversampling,
        );
        Ok(())
    }

    /// Close the port behind `handle`.
    ///
    /// Interrupts and clock are switched off; bytes still queued for
    /// transmission are discarded. Call [`flush_tx`](Self::flush_tx) first to
    /// keep them.
    pub fn close(&self, handle: &UartHandle) -> Result<()> {
        let slot = self.bound(handle)?;
        if slot.state() != PortState::Closed {
            self.shutdown(slot);
        }
        Ok(())
    }

    fn shutdown(&self, slot: &UartSlot<I, TX, RX>) {
        let id = slot.id();
        let mut session = slot.session.lock();

        self.regs.set_tx_interrupt(id, false);
        self.regs.set_rx_interrupt(id, false);
        self.clock.disable(id);

        slot.set_state(PortState::Closed);
        slot.tx.clear();
        *session = None;
        drop(session);

        debug!("{}: closed", id);
    }

    fn line_config(&self, id: PeripheralId, config: &SerialConfig) -> Result<LineConfig> {
        let format = FrameFormat {
            data_bits: config.data_bits,
            parity: config.parity,
            stop_bits: config.stop_bits,
        };
        if !self.regs.supports(id, &format) {
            warn!("{}: frame format {:?} not supported", id, format);
            return Err(UartError::InvalidConfig);
        }

        let oversampling = Oversampling::from_double_speed(config.double_speed);
        let clock_hz = self.clock.frequency(config.clock_source);
        let rate = BaudRate::compute(clock_hz, config.baud_rate, oversampling, R::MAX_DIVISOR)
            .inspect_err(|_| {
                warn!(
                    "{}: {} baud not reachable from {} Hz ({:?})",
                    id, config.baud_rate, clock_hz, oversampling
                )
            })?;

        debug!(
            "{}: {} Hz / {:?} -> divisor {}, effective {} baud ({} ppm)",
            id, clock_hz, oversampling, rate.divisor, rate.effective, rate.error_ppm
        );

        Ok(LineConfig {
            divisor: rate.divisor,
            oversampling,
            format,
        })
    }

    // ------------------------------------------------------------------
    // Transmit
    // ------------------------------------------------------------------

    /// Queue `byte`, spinning while the TX ring is full.
    ///
    /// `Ok` means the byte is queued. `NotOpen` from a port that closed or
    /// faulted during the wait means it was not.
    pub fn write(&self, handle: &UartHandle, byte: u8) -> Result<()> {
        let slot = self.open_slot(handle)?;
        let id = slot.id();
        // SAFETY: foreground code is the only TX producer.
        let mut tx = unsafe { slot.tx.producer() };

        if !tx.try_push(byte) {
            // Make sure the handler is running to free up space.
            self.regs.set_tx_interrupt(id, true);
            while !tx.try_push(byte) {
                if !slot.is_open() {
                    return Err(UartError::NotOpen);
                }
                core::hint::spin_loop();
            }
        }

        // Queued bytes are sent even if the line faulted meanwhile.
        self.regs.set_tx_interrupt(id, true);
        Ok(())
    }

    /// Queue `byte` if there is room.
    ///
    /// Returns `Ok(false)` when the ring is full; the byte is dropped and the
    /// TX overflow flag set.
    pub fn write_nonblocking(&self, handle: &UartHandle, byte: u8) -> Result<bool> {
        let slot = self.open_slot(handle)?;
        // SAFETY: foreground code is the only TX producer.
        let queued = unsafe { slot.tx.producer() }.try_push(byte);

        if queued {
            self.regs.set_tx_interrupt(slot.id(), true);
        } else {
            slot.set_overflow(Direction::Tx);
        }
        Ok(queued)
    }

    /// Queue all of `bytes`, spinning whenever the ring is full.
    pub fn write_all(&self, handle: &UartHandle, bytes: &[u8]) -> Result<()> {
        for &byte in bytes {
            self.write(handle, byte)?;
        }
        Ok(())
    }

    /// Spin until every queued byte has left the shift register.
    pub fn flush_tx(&self, handle: &UartHandle) -> Result<()> {
        let slot = self.open_slot(handle)?;
        let id = slot.id();

        loop {
            if !slot.is_open() {
                return Err(UartError::NotOpen);
            }
            if slot.tx.is_empty() && self.regs.status(id).contains(Status::TX_COMPLETE) {
                return Ok(());
            }
            core::hint::spin_loop();
        }
    }

    /// Bytes queued but not yet handed to the hardware.
    pub fn tx_pending(&self, handle: &UartHandle) -> Result<usize> {
        Ok(self.bound(handle)?.tx.len())
    }

    /// Whether anything is queued or still shifting out.
    pub fn tx_busy(&self, handle: &UartHandle) -> Result<bool> {
        let slot = self.open_slot(handle)?;
        Ok(!slot.tx.is_empty() || !self.regs.status(slot.id()).contains(Status::TX_COMPLETE))
    }

    // ------------------------------------------------------------------
    // Receive
    // ------------------------------------------------------------------

    /// Take the oldest received byte, spinning until one arrives.
    pub fn read(&self, handle: &UartHandle) -> Result<u8> {
        let slot = self.open_slot(handle)?;
        // SAFETY: foreground code is the only RX consumer.
        let mut rx = unsafe { slot.rx.consumer() };

        loop {
            if !slot.is_open() {
                return Err(UartError::NotOpen);
            }
            if let Some(byte) = rx.try_pop() {
                return Ok(byte);
            }
            core::hint::spin_loop();
        }
    }

    /// Take the oldest received byte, if any.
    pub fn read_nonblocking(&self, handle: &UartHandle) -> Result<Option<u8>> {
        let slot = self.open_slot(handle)?;
        // SAFETY: foreground code is the only RX consumer.
        Ok(unsafe { slot.rx.consumer() }.try_pop())
    }

    /// Move as many received bytes as fit into `buf`. Never blocks.
    pub fn read_into(&self, handle: &UartHandle, buf: &mut [u8]) -> Result<usize> {
        let slot = self.open_slot(handle)?;
        // SAFETY: foreground code is the only RX consumer.
        let mut rx = unsafe { slot.rx.consumer() };

        let mut count = 0;
        for byte in buf.iter_mut() {
            match rx.try_pop() {
                Some(b) => *byte = b,
                None => break,
            }
            count += 1;
        }
        Ok(count)
    }

    /// Bytes received and waiting to be read.
    pub fn rx_available(&self, handle: &UartHandle) -> Result<usize> {
        Ok(self.bound(handle)?.rx.len())
    }

    /// Throw away everything received so far.
    pub fn discard_rx(&self, handle: &UartHandle) -> Result<usize> {
        let slot = self.open_slot(handle)?;
        // SAFETY: foreground code is the only RX consumer.
        let mut rx = unsafe { slot.rx.consumer() };

        let mut dropped = 0;
        while rx.try_pop().is_some() {
            dropped += 1;
        }
        Ok(dropped)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn state(&self, handle: &UartHandle) -> PortState {
        self.bound(handle)
            .map(|slot| slot.state())
            .unwrap_or(PortState::Closed)
    }

    /// Line settings of the current session.
    pub fn config(&self, handle: &UartHandle) -> Option<SerialConfig> {
        let slot = self.bound(handle).ok()?;
        *slot.session.lock()
    }

    /// Sticky overflow flag for `direction`. Only the caller clears it.
    pub fn overflow(&self, handle: &UartHandle, direction: Direction) -> Result<bool> {
        Ok(self.bound(handle)?.overflow(direction))
    }

    pub fn clear_overflow(&self, handle: &UartHandle, direction: Direction) -> Result<()> {
        self.bound(handle)?.clear_overflow(direction);
        Ok(())
    }

    /// Line errors latched since the port was opened.
    pub fn line_errors(&self, handle: &UartHandle) -> Result<Status> {
        Ok(self.bound(handle)?.line_errors())
    }

    /// `Ok` for an open handle, the latched fault for a faulted one.
    pub fn check(&self, handle: &UartHandle) -> Result<()> {
        let slot = self.bound(handle)?;
        match slot.state() {
            PortState::Open => Ok(()),
            PortState::Error => Err(UartError::HardwareFault(slot.line_errors())),
            PortState::Closed => Err(UartError::NotOpen),
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    fn lookup(&self, id: PeripheralId) -> Result<&UartSlot<I, TX, RX>> {
        self.registry.get(id).ok_or_else(|| {
            warn!("{}: not an enabled peripheral", id);
            UartError::InvalidPeripheral(id)
        })
    }

    fn bound(&self, handle: &UartHandle) -> Result<&UartSlot<I, TX, RX>> {
        handle
            .port
            .and_then(|id| self.registry.get(id))
            .ok_or(UartError::NotOpen)
    }

    fn open_slot(&self, handle: &UartHandle) -> Result<&UartSlot<I, TX, RX>> {
        let slot = self.bound(handle)?;
        if slot.is_open() {
            Ok(slot)
        } else {
            Err(UartError::NotOpen)
        }
    }
}

fn parity_char(parity: Parity) -> char {
    match parity {
        Parity::None => 'N',
        Parity::Even => 'E',
        Parity::Odd => 'O',
    }
}

fn stop_count(stop_bits: StopBits) -> u8 {
    match stop_bits {
        StopBits::One => 1,
        StopBits::Two => 2,
    }
}
