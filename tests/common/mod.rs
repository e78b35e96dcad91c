//! In-memory stand-ins for the two hardware seams.

use std::collections::VecDeque;

use tiller_boot::bus::{TwiEvent, TwiSlave};
use tiller_boot::consts::{ERASED, PAGE_SIZE};
use tiller_boot::flash::{FlashPage, WriteErase};

/// Total simulated program memory (application + bootloader regions).
pub const FLASH_END: usize = 0x2000;

/// Flat byte-array flash with page-granular erase, the way the real
/// controller behaves once its busy-wait completes.
pub struct RamFlash {
    pub mem: [u8; FLASH_END],
}

impl RamFlash {
    pub fn new() -> Self {
        Self {
            mem: [ERASED; FLASH_END],
        }
    }

    /// Pre-seed a region, to prove later that nothing touched it.
    pub fn fill(&mut self, from: usize, to: usize, value: u8) {
        for byte in &mut self.mem[from..to] {
            *byte = value;
        }
    }
}

impl WriteErase for RamFlash {
    fn erase_page(&mut self, page: FlashPage) {
        let base = page.0 as usize;
        for byte in &mut self.mem[base..base + PAGE_SIZE] {
            *byte = ERASED;
        }
    }

    fn write_page(&mut self, page: FlashPage, data: &[u8; PAGE_SIZE]) {
        let base = page.0 as usize;
        self.mem[base..base + PAGE_SIZE].copy_from_slice(data);
    }
}

/// Scripted master: transfers queue up as events and replies accumulate in
/// `sent`, mimicking the driver's single-pending-transfer pacing.
pub struct ScriptBus {
    events: VecDeque<TwiEvent>,
    rx: VecDeque<u8>,
    pub sent: Vec<u8>,
}

impl ScriptBus {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            rx: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Queue a master write of `bytes`.
    pub fn master_write(&mut self, bytes: &[u8]) {
        self.events.push_back(TwiEvent::Receive { len: bytes.len() });
        self.rx.extend(bytes);
    }

    /// Queue a master read (reply request).
    pub fn master_read(&mut self) {
        self.events.push_back(TwiEvent::Request);
    }

    /// Take everything transmitted so far.
    pub fn drain_sent(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.sent)
    }
}

impl TwiSlave for ScriptBus {
    fn poll(&mut self) -> Option<TwiEvent> {
        self.events.pop_front()
    }

    fn receive_byte(&mut self) -> u8 {
        self.rx.pop_front().unwrap_or(0)
    }

    fn transmit_byte(&mut self, byte: u8) {
        self.sent.push(byte);
    }
}

/// LED stub; the toggle trail is irrelevant to these tests.
pub struct NullPin;

impl embedded_hal::digital::v2::OutputPin for NullPin {
    type Error = core::convert::Infallible;

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
