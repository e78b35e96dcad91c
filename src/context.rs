//! Mutable bootloader state, gathered in one place.
//!
//! Everything the dispatcher and the commit engine may touch lives in
//! [`BootContext`], owned by the scheduler and passed down by reference, so
//! the single-threaded access discipline is visible at every call boundary.

use crate::consts::PAGE_SIZE;
use crate::page_buffer::PageBuffer;

/// Independent condition flags driven by the command dispatcher and read by
/// the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    /// First half of the init handshake seen.
    pub init_step_1: bool,
    /// Second half of the init handshake seen.
    pub init_step_2: bool,
    /// Master asked for the application region to be erased.
    pub delete_flash_requested: bool,
    /// The image in flash is believed runnable. Starts true and is cleared
    /// the moment a chunk checksum fails.
    pub application_ready: bool,
    /// Master asked us to leave and run the application.
    pub exit_requested: bool,
}

impl Status {
    pub const fn at_reset() -> Self {
        Self {
            init_step_1: false,
            init_step_2: false,
            delete_flash_requested: false,
            application_ready: true,
            exit_requested: false,
        }
    }

    /// Both handshake halves seen, in separate transfers.
    pub fn handshake_complete(&self) -> bool {
        self.init_step_1 && self.init_step_2
    }
}

/// State shared by the dispatcher, the commit engine and the scheduler.
pub struct BootContext {
    pub status: Status,
    pub page: PageBuffer,
    /// Target byte address for the next completed page. Always page-aligned.
    pub page_addr: u16,
    /// Relocated application jump, refreshed on every reset-page commit.
    pub trampoline: [u8; 2],
}

impl BootContext {
    pub const fn new() -> Self {
        Self {
            status: Status::at_reset(),
            page: PageBuffer::new(),
            page_addr: 0,
            trampoline: [0u8; 2],
        }
    }

    /// Commit done: aim at the next page and make room for its bytes.
    pub fn advance_page(&mut self) {
        self.page_addr = self.page_addr.wrapping_add(PAGE_SIZE as u16);
        self.page.clear();
    }
}

impl Default for BootContext {
    fn default() -> Self {
        Self::new()
    }
}
