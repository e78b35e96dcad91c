//! Relative-jump arithmetic for the shared reset vector.
//!
//! The device has a single physical reset vector slot and the bootloader
//! owns it. The application's own reset vector is lifted out of page 0 when
//! that page is committed and re-encoded as a jump placed in the last two
//! bytes below [`BOOTLOADER_START`](crate::consts::BOOTLOADER_START), so
//! that leaving the bootloader still reaches the application entry point.
//!
//! Instruction encoding: `0b1100_kkkk_kkkk_kkkk`, a relative jump with a
//! 12-bit two's-complement displacement counted in words from the address
//! *after* the instruction. All arithmetic here is word-unit and wraps
//! modulo the 4096-word address space, which is exactly what the silicon
//! does.

const RJMP_OPCODE: u16 = 0xC000;
const RJMP_OFFSET_MASK: u16 = 0x0FFF;

/// Jump instruction for the reset vector slot, targeting the bootloader
/// entry at `bootloader_start` (a byte address).
pub fn bootloader_reset_vector(bootloader_start: u16) -> [u8; 2] {
    let offset = (bootloader_start / 2).wrapping_sub(1) & RJMP_OFFSET_MASK;
    (RJMP_OPCODE | offset).to_le_bytes()
}

/// Relocated jump for the trampoline slot.
///
/// `app_vector` is the application's original reset vector instruction as
/// the image supplied it; `bootloader_start` is the bootloader's byte load
/// address. The result, executed from the slot one word below
/// `bootloader_start`, lands on the address the original vector targeted.
pub fn trampoline(app_vector: [u8; 2], bootloader_start: u16) -> [u8; 2] {
    let insn = u16::from_le_bytes(app_vector);
    // Where the original jump, sitting in word 0, was pointing (in words).
    let target = insn.wrapping_add(1) & RJMP_OFFSET_MASK;
    // The trampoline slot is the word at bootloader_start - 2, so the word
    // after it is bootloader_start / 2. Displacement from there to the
    // target; negative offsets wrap through the mask.
    let offset = target.wrapping_sub(bootloader_start / 2) & RJMP_OFFSET_MASK;
    (RJMP_OPCODE | offset).to_le_bytes()
}

/// Byte address a relative jump stored at byte address `slot` resolves to.
pub fn resolve_rjmp(insn: [u8; 2], slot: u16) -> u16 {
    let word = u16::from_le_bytes(insn);
    let offset = word & RJMP_OFFSET_MASK;
    let target = (slot / 2).wrapping_add(1).wrapping_add(offset) & RJMP_OFFSET_MASK;
    target * 2
}
