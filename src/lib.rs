#![no_std]

//! Core of a resident TWI bootloader for small flash-paged microcontrollers.
//!
//! The crate owns the protocol state machine, the page-write engine and the
//! reset-vector trampoline arithmetic. The pieces it does not own are behind
//! traits: the two-wire slave driver ([`bus::TwiSlave`]) and the program
//! memory controller ([`flash::WriteErase`]). A firmware binary wires those
//! to real peripherals, polls [`boot_machine::BootMachine`] forever, and
//! performs the final indirect jump once a [`boot_machine::Handoff`] comes
//! back.

#[macro_use]
pub mod log;

pub mod boot_machine;
pub mod bus;
pub mod consts;
pub mod context;
pub mod dispatch;
pub mod flash;
pub mod page_buffer;
pub mod protocol;
pub mod trampoline;

#[cfg(feature = "defmt-log")]
mod defmt_support {
    use core::sync::atomic::{AtomicUsize, Ordering};
    use defmt_rtt as _; // global logger
    use panic_probe as _;

    // same panicking *behavior* as `panic-probe` but doesn't print a panic message
    // this prevents the panic message being printed *twice* when `defmt::panic` is invoked
    #[defmt::panic_handler]
    fn panic() -> ! {
        cortex_m::asm::udf()
    }

    static COUNT: AtomicUsize = AtomicUsize::new(0);

    defmt::timestamp!("{=usize}", {
        // NOTE(no-CAS) `timestamps` runs with interrupts disabled
        let n = COUNT.load(Ordering::Relaxed);
        COUNT.store(n + 1, Ordering::Relaxed);
        n
    });
}

#[cfg(feature = "panic-reset")]
use panic_reset as _;

/// Additive (sum mod 256) checksum used by the wire protocol.
pub fn additive_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}
