//! AVR-style memory-mapped USART.
//!
//! Register block found on megaAVR parts (USART0..3 on ATmega640/1280/2560,
//! USART0 on ATmega328P): one status register, two control registers, a
//! 12-bit baud divisor split across two bytes, and the data register.
//!
//! | offset | register | contents                                      |
//! |--------|----------|-----------------------------------------------|
//! | 0      | UCSRA    | RXC TXC UDRE FE DOR UPE U2X MPCM              |
//! | 1      | UCSRB    | RXCIE TXCIE UDRIE RXEN TXEN UCSZ2 RXB8 TXB8   |
//! | 2      | UCSRC    | UMSEL1:0 UPM1:0 USBS UCSZ1:0 UCPOL            |
//! | 4      | UBRRL    | divisor bits 7:0                              |
//! | 5      | UBRRH    | divisor bits 11:8                             |
//! | 6      | UDR      | data                                          |

use core::marker::PhantomData;
use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{AtomicBool, Ordering};

use common::sync::{IrqControl, without_interrupts};

use crate::baud::Oversampling;
use crate::hal::registers::{FrameFormat, LineConfig, Status, UartRegisters};
use crate::hal::serial::{DataBits, Parity, StopBits};
use crate::registry::PeripheralId;

// Register offsets
const UCSRA: usize = 0x0;
const UCSRB: usize = 0x1;
const UCSRC: usize = 0x2;
const UBRRL: usize = 0x4;
const UBRRH: usize = 0x5;
const UDR: usize = 0x6;

// UCSRA bits
const RXC: u8 = 1 << 7;
const TXC: u8 = 1 << 6;
const UDRE: u8 = 1 << 5;
const FE: u8 = 1 << 4;
const DOR: u8 = 1 << 3;
const UPE: u8 = 1 << 2;
const U2X: u8 = 1 << 1;
const MPCM: u8 = 1 << 0;

// UCSRB bits
const RXCIE: u8 = 1 << 7;
const UDRIE: u8 = 1 << 5;
const RXEN: u8 = 1 << 4;
const TXEN: u8 = 1 << 3;
const UCSZ2: u8 = 1 << 2;

// UCSRC bits
const UPM_EVEN: u8 = 0b10 << 4;
const UPM_ODD: u8 = 0b11 << 4;
const USBS: u8 = 1 << 3;
const UCSZ_SHIFT: u8 = 1;

/// Addresses of USART0..USART3 on the ATmega640/1280/2560.
pub const ATMEGA2560_BASES: [usize; 4] = [0xC0, 0xC8, 0xD0, 0x130];

/// `N` USART instances at fixed base addresses, indexed by [`PeripheralId`].
///
/// TXC reads zero out of reset and after `configure` until a frame has
/// been shifted out, so an idle line that never transmitted is reported
/// complete from UDRE alone.
pub struct Usart<I: IrqControl, const N: usize> {
    bases: [usize; N],
    // A byte went to UDR since the last configure
    written: [AtomicBool; N],
    _irq: PhantomData<I>,
}

impl<I: IrqControl, const N: usize> Usart<I, N> {
    /// Create a new USART register accessor.
    ///
    /// # Safety
    ///
    /// - every entry of `bases` must point to a USART register block
    /// - only one accessor should exist per set of blocks
    pub const unsafe fn new(bases: [usize; N]) -> Self {
        Self {
            bases,
            written: [const { AtomicBool::new(false) }; N],
            _irq: PhantomData,
        }
    }

    #[inline]
    fn base(&self, port: PeripheralId) -> Option<usize> {
        self.bases.get(port.index()).copied()
    }

    fn set_written(&self, port: PeripheralId, written: bool) {
        if let Some(flag) = self.written.get(port.index()) {
            flag.store(written, Ordering::Release);
        }
    }

    fn has_written(&self, port: PeripheralId) -> bool {
        self.written
            .get(port.index())
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    #[inline]
    fn read_reg(&self, port: PeripheralId, offset: usize) -> u8 {
        match self.base(port) {
            Some(base) => unsafe { read_volatile((base + offset) as *const u8) },
            None => 0,
        }
    }

    #[inline]
    fn write_reg(&self, port: PeripheralId, offset: usize, value: u8) {
        if let Some(base) = self.base(port) {
            unsafe { write_volatile((base + offset) as *mut u8, value) }
        }
    }

    /// Read-modify-write of UCSRB. The foreground and the TX handler both
    /// flip bits in it, so the update runs with interrupts masked.
    fn modify_control(&self, port: PeripheralId, mask: u8, set: bool) {
        without_interrupts::<I, _>(|| {
            let value = self.read_reg(port, UCSRB);
            let value = if set { value | mask } else { value & !mask };
            self.write_reg(port, UCSRB, value);
        });
    }

    fn frame_bits(format: &FrameFormat) -> (u8, u8) {
        let ucsz: u8 = match format.data_bits {
            DataBits::Five => 0b000,
            DataBits::Six => 0b001,
            DataBits::Seven => 0b010,
            DataBits::Eight => 0b011,
            DataBits::Nine => 0b111,
        };
        let parity = match format.parity {
            Parity::None => 0,
            Parity::Even => UPM_EVEN,
            Parity::Odd => UPM_ODD,
        };
        let stop = match format.stop_bits {
            StopBits::One => 0,
            StopBits::Two => USBS,
        };

        let ucsrc = parity | stop | ((ucsz & 0b011) << UCSZ_SHIFT);
        let ucsrb = if ucsz & 0b100 != 0 { UCSZ2 } else { 0 };
        (ucsrb, ucsrc)
    }
}

impl<I: IrqControl, const N: usize> UartRegisters for Usart<I, N> {
    fn configure(&self, port: PeripheralId, line: &LineConfig) {
        let interrupts = self.read_reg(port, UCSRB) & (RXCIE | UDRIE);

        // Disable receiver and transmitter while reprogramming
        self.write_reg(port, UCSRB, interrupts);

        self.write_reg(port, UBRRH, ((line.divisor >> 8) & 0x0F) as u8);
        self.write_reg(port, UBRRL, (line.divisor & 0xFF) as u8);

        // Writing TXC clears it; error flags must be written as zero.
        let speed = match line.oversampling {
            Oversampling::X8 => U2X,
            Oversampling::X16 => 0,
        };
        self.write_reg(port, UCSRA, speed | TXC);
        self.set_written(port, false);

        let (size_high, ucsrc) = Self::frame_bits(&line.format);
        self.write_reg(port, UCSRC, ucsrc);

        self.write_reg(port, UCSRB, interrupts | size_high | RXEN | TXEN);
    }

    fn supports(&self, port: PeripheralId, format: &FrameFormat) -> bool {
        // The ninth bit lives in UCSRB and has no place in a byte stream.
        self.base(port).is_some() && format.data_bits != DataBits::Nine
    }

    fn read_data(&self, port: PeripheralId) -> u8 {
        self.read_reg(port, UDR)
    }

    fn write_data(&self, port: PeripheralId, byte: u8) {
        // Clear TXC so it reports completion of this byte.
        let keep = self.read_reg(port, UCSRA) & (U2X | MPCM);
        self.write_reg(port, UCSRA, keep | TXC);
        self.set_written(port, true);
        self.write_reg(port, UDR, byte);
    }

    fn set_rx_interrupt(&self, port: PeripheralId, enabled: bool) {
        self.modify_control(port, RXCIE, enabled);
    }

    fn set_tx_interrupt(&self, port: PeripheralId, enabled: bool) {
        self.modify_control(port, UDRIE, enabled);
    }

    fn status(&self, port: PeripheralId) -> Status {
        let ucsra = self.read_reg(port, UCSRA);
        let mut status = Status::empty();

        status.set(Status::RX_READY, ucsra & RXC != 0);
        status.set(Status::TX_EMPTY, ucsra & UDRE != 0);
        let idle = ucsra & UDRE != 0 && !self.has_written(port);
        status.set(Status::TX_COMPLETE, ucsra & TXC != 0 || idle);
        status.set(Status::FRAMING_ERROR, ucsra & FE != 0);
        status.set(Status::OVERRUN, ucsra & DOR != 0);
        status.set(Status::PARITY_ERROR, ucsra & UPE != 0);
        status
    }
}

// SAFETY: the accessor only holds addresses and atomics; every register
// access is a volatile byte access and the read-modify-write paths mask
// interrupts.
unsafe impl<I: IrqControl, const N: usize> Send for Usart<I, N> {}
unsafe impl<I: IrqControl, const N: usize> Sync for Usart<I, N> {}
