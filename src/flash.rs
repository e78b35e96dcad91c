//! Page commit engine: erase/write sequencing against program memory.
//!
//! The memory controller itself sits behind [`WriteErase`]; implementations
//! busy-wait their hardware to completion, so every call here returns with
//! the page physically settled. No partial-page writes exist at this level:
//! a commit always erases the target page and rewrites all of it.

use crate::consts::{BOOTLOADER_START, PAGE_SIZE, TRAMPOLINE_PAGE};
use crate::context::BootContext;
use crate::trampoline;

/// One erase/write unit of program memory, by page-aligned byte address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashPage(pub u16);

/// Page-erase and page-write primitives of the program memory controller.
pub trait WriteErase {
    /// Erase the page to all-0xFF, blocking until the hardware is done.
    fn erase_page(&mut self, page: FlashPage);

    /// Program a full page, blocking until the hardware is done.
    fn write_page(&mut self, page: FlashPage, data: &[u8; PAGE_SIZE]);
}

impl BootContext {
    /// Commit the page buffer to the current page cursor.
    ///
    /// Page 0 gets its reset vector lifted into the trampoline and replaced
    /// with a jump back into the bootloader; the trampoline page gets its
    /// last two bytes patched; anything at or past the bootloader base is
    /// refused untouched. After a page-0 commit the trampoline page is
    /// rewritten out-of-band and the cursor returns to the start.
    pub fn commit_page(&mut self, flash: &mut impl WriteErase) {
        let addr = self.page_addr;
        let reset_page = addr == 0;

        if reset_page {
            let vector = [self.page.bytes()[0], self.page.bytes()[1]];
            self.trampoline = trampoline::trampoline(vector, BOOTLOADER_START);
            self.redirect_reset_vector();
        }

        if addr == TRAMPOLINE_PAGE {
            self.place_trampoline();
        }

        if addr >= BOOTLOADER_START {
            boot_log!(warn, "refused write into bootloader region at {=u16:X}", addr);
            return;
        }

        boot_log!(info, "writing page at {=u16:X}", addr);
        flash.erase_page(FlashPage(addr));
        flash.write_page(FlashPage(addr), self.page.bytes());

        if reset_page {
            self.write_trampoline_page(flash);
            self.page_addr = 0;
        }
    }

    /// Erase every application page, leaving only a reset vector that jumps
    /// back into the bootloader. Safe to run any number of times.
    pub fn erase_application(&mut self, flash: &mut impl WriteErase) {
        boot_log!(info, "erasing application region");

        self.page.clear();
        self.redirect_reset_vector();
        flash.erase_page(FlashPage(0));
        flash.write_page(FlashPage(0), self.page.bytes());

        let mut addr = PAGE_SIZE as u16;
        while addr < BOOTLOADER_START {
            flash.erase_page(FlashPage(addr));
            addr += PAGE_SIZE as u16;
        }

        self.page.clear();
        self.page_addr = 0;
    }

    /// Rewrite the trampoline page: erased filler with the current
    /// trampoline bytes in its final word.
    fn write_trampoline_page(&mut self, flash: &mut impl WriteErase) {
        if self.page_addr >= TRAMPOLINE_PAGE {
            return;
        }
        self.page_addr = TRAMPOLINE_PAGE;
        self.page.clear();
        self.place_trampoline();
        flash.erase_page(FlashPage(TRAMPOLINE_PAGE));
        flash.write_page(FlashPage(TRAMPOLINE_PAGE), self.page.bytes());
    }

    /// Point the buffered reset vector at the bootloader entry.
    fn redirect_reset_vector(&mut self) {
        let vector = trampoline::bootloader_reset_vector(BOOTLOADER_START);
        self.page.bytes_mut()[..2].copy_from_slice(&vector);
    }

    fn place_trampoline(&mut self) {
        let trampoline = self.trampoline;
        let bytes = self.page.bytes_mut();
        bytes[PAGE_SIZE - 2] = trampoline[0];
        bytes[PAGE_SIZE - 1] = trampoline[1];
    }
}
