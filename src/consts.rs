//! Memory layout and protocol tuning constants.

/// Smallest erase/write unit of the program memory, in bytes.
pub const PAGE_SIZE: usize = 64;

/// First byte address of the bootloader's own code. Everything below it is
/// the application region; commits at or past it are refused.
pub const BOOTLOADER_START: u16 = 0x1900;

/// The last application page, reserved for the relocated application jump.
pub const TRAMPOLINE_PAGE: u16 = BOOTLOADER_START - PAGE_SIZE as u16;

/// Fixed application entry slot, one word below the bootloader.
pub const APP_ENTRY: u16 = BOOTLOADER_START - 2;

/// Value of erased flash.
pub const ERASED: u8 = 0xFF;

/// Bytes of page data carried by one write command.
// NOTE: Do not raise past 8, long transfers hurt TWI reliability.
pub const WRITE_CHUNK_LEN: usize = 8;

/// Capacity of the inbound command buffer.
pub const CMD_MAX_LEN: usize = (WRITE_CHUNK_LEN * 2) + 2;

/// Capacity of the outbound reply buffer.
pub const REPLY_MAX_LEN: usize = CMD_MAX_LEN;

/// Single-byte answer to a command we do not understand.
pub const UNKNOWN_CMD: u8 = 0xFF;

/// Loop passes between LED toggles while waiting for the init handshake.
pub const TOGGLE_TICKS: u16 = 0xFFFF;

/// Loop passes to let a reply finish transmitting before the next
/// flash-affecting action.
pub const SETTLE_TICKS: u16 = 0x7FFF;

/// LED toggles to wait for a master before giving up and running whatever
/// application is already in flash.
// NOTE: Values under 80 can make it hard for the master to initialize in time.
pub const EXIT_TOGGLES: u8 = 80;

/// Two-byte identity returned by the version command.
pub const SIGNATURE: [u8; 2] = *b"TB";

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

/// Longest data window a buffer-readback reply may carry.
#[cfg(feature = "cmd-read-buffer")]
pub const MAX_REPLY_DATA: usize = 5;

const _: () = assert!(BOOTLOADER_START as usize % PAGE_SIZE == 0);
const _: () = assert!(PAGE_SIZE <= 256);
const _: () = assert!(WRITE_CHUNK_LEN <= 8);
