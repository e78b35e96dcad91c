//! Polling interface to the external two-wire slave driver.
//!
//! The driver turns raw bus edges into whole buffered transfers; this trait
//! is the edge-triggered surface the scheduler drains once per loop pass.
//! At most one command is ever pending: a new transfer may not begin until
//! the previous reply has finished transmitting, which the driver is
//! responsible for pacing on the wire.

/// Bus activity reported by the driver. Returning an event clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwiEvent {
    /// A master write of `len` bytes completed; the bytes are waiting in
    /// the driver's receive buffer.
    Receive { len: usize },
    /// The master started a read; the reply must be queued now.
    Request,
}

pub trait TwiSlave {
    /// Poll for a pending bus event.
    fn poll(&mut self) -> Option<TwiEvent>;

    /// Next buffered byte of the transfer announced by [`TwiEvent::Receive`].
    fn receive_byte(&mut self) -> u8;

    /// Queue one byte of the reply for the in-progress master read.
    fn transmit_byte(&mut self, byte: u8);
}
