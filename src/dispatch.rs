//! Command dispatcher: one received request in, one reply out.
//!
//! The dispatcher never blocks and never touches the bus itself; the
//! scheduler feeds it the consumed [`CommandBuffer`] and transmits whatever
//! lands in the [`Reply`]. All state changes go through the [`BootContext`]
//! flags so the scheduler decides *when* flash-affecting work happens.

use crate::consts::{
    BOOTLOADER_START, PAGE_SIZE, SIGNATURE, UNKNOWN_CMD, VERSION_MAJOR, VERSION_MINOR,
    WRITE_CHUNK_LEN,
};
use crate::context::BootContext;
use crate::protocol::{CommandBuffer, Opcode, Reply};

impl BootContext {
    /// Interpret one request and build its reply.
    pub fn dispatch(&mut self, cmd: &CommandBuffer, reply: &mut Reply) {
        let bytes = cmd.as_bytes();
        let op = match bytes.first() {
            Some(&op) => op,
            None => return,
        };
        let ack = !op;

        match Opcode::from(op) {
            Opcode::Init => {
                self.status.init_step_1 = true;
                reply.push(ack);
            }
            Opcode::GetVersion => {
                self.status.init_step_2 = true;
                reply.push(ack);
                reply.push(SIGNATURE[0]);
                reply.push(SIGNATURE[1]);
                reply.push(VERSION_MAJOR);
                reply.push(VERSION_MINOR);
                let base = BOOTLOADER_START.to_be_bytes();
                reply.push(base[0]);
                reply.push(base[1]);
            }
            Opcode::SetPageAddress if bytes.len() >= 3 => {
                let (msb, lsb) = (bytes[1], bytes[2]);
                self.page_addr = u16::from_be_bytes([msb, lsb]) & !(PAGE_SIZE as u16 - 1);
                boot_log!(info, "page cursor set to {=u16:X}", self.page_addr);
                reply.push(ack);
                reply.push(msb.wrapping_add(lsb));
            }
            Opcode::WritePage if bytes.len() >= 1 + WRITE_CHUNK_LEN + 1 => {
                let chunk = &bytes[1..1 + WRITE_CHUNK_LEN];
                let sum = self.page.push_chunk(chunk);
                if sum != bytes[1 + WRITE_CHUNK_LEN] {
                    // A damaged image must never run: drop the ready flag and
                    // schedule destructive recovery.
                    boot_log!(error, "chunk checksum mismatch, scheduling erase");
                    self.status.application_ready = false;
                    self.status.delete_flash_requested = true;
                }
                reply.push(ack);
                reply.push(sum);
            }
            Opcode::DeleteFlash => {
                self.status.delete_flash_requested = true;
                reply.push(ack);
            }
            Opcode::Exit => {
                self.status.exit_requested = true;
                reply.push(ack);
            }
            #[cfg(feature = "cmd-read-buffer")]
            Opcode::ReadBuffer => self.read_buffer(bytes, reply),
            _ => {
                // Unknown opcode, or a known one cut short: echo the sentinel
                // once per request byte and change nothing.
                for _ in 0..bytes.len() {
                    reply.push(UNKNOWN_CMD);
                }
            }
        }
    }

    /// Answer a window of the page buffer: `[start (1-based), count]` in,
    /// `[ack, data.., additive checksum]` out.
    #[cfg(feature = "cmd-read-buffer")]
    fn read_buffer(&self, bytes: &[u8], reply: &mut Reply) {
        use crate::consts::MAX_REPLY_DATA;

        let (start, count) = match bytes {
            [_, start, count, ..] => (*start as usize, *count as usize),
            _ => {
                reply.push(UNKNOWN_CMD);
                return;
            }
        };

        if start == 0 || count == 0 || count > MAX_REPLY_DATA * 2 || start + count > PAGE_SIZE + 1 {
            reply.push(UNKNOWN_CMD);
            return;
        }

        reply.push(!bytes[0]);
        let window = &self.page.bytes()[start - 1..start - 1 + count];
        for &byte in window {
            reply.push(byte);
        }
        reply.push(crate::additive_checksum(window));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(bytes: &[u8]) -> CommandBuffer {
        let mut cmd = CommandBuffer::new();
        for &b in bytes {
            cmd.push(b);
        }
        cmd
    }

    fn run(ctx: &mut BootContext, bytes: &[u8]) -> Reply {
        let mut reply = Reply::new();
        ctx.dispatch(&request(bytes), &mut reply);
        reply
    }

    #[test]
    fn version_before_init_leaves_handshake_open() {
        let mut ctx = BootContext::new();

        run(&mut ctx, &[Opcode::GetVersion as u8]);
        assert!(!ctx.status.handshake_complete());

        run(&mut ctx, &[Opcode::Init as u8]);
        assert!(ctx.status.handshake_complete());
    }

    #[test]
    fn init_then_version_completes_handshake() {
        let mut ctx = BootContext::new();

        let reply = run(&mut ctx, &[Opcode::Init as u8]);
        assert_eq!(reply.as_bytes(), &[!(Opcode::Init as u8)]);
        assert!(!ctx.status.handshake_complete());

        run(&mut ctx, &[Opcode::GetVersion as u8]);
        assert!(ctx.status.handshake_complete());
    }

    #[test]
    fn version_reply_carries_identity_and_base_address() {
        let mut ctx = BootContext::new();
        let reply = run(&mut ctx, &[Opcode::GetVersion as u8]);
        assert_eq!(
            reply.as_bytes(),
            &[
                !(Opcode::GetVersion as u8),
                SIGNATURE[0],
                SIGNATURE[1],
                VERSION_MAJOR,
                VERSION_MINOR,
                (BOOTLOADER_START >> 8) as u8,
                BOOTLOADER_START as u8,
            ]
        );
    }

    #[test]
    fn page_address_is_set_aligned_and_checksummed() {
        let mut ctx = BootContext::new();
        let reply = run(&mut ctx, &[Opcode::SetPageAddress as u8, 0x12, 0x9F]);
        // 0x129F aligned down to the page boundary.
        assert_eq!(ctx.page_addr, 0x1280);
        assert_eq!(
            reply.as_bytes(),
            &[!(Opcode::SetPageAddress as u8), 0x12u8.wrapping_add(0x9F)]
        );
    }

    #[test]
    fn good_chunk_extends_the_page() {
        let mut ctx = BootContext::new();
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut req = [0u8; 10];
        req[0] = Opcode::WritePage as u8;
        req[1..9].copy_from_slice(&data);
        req[9] = 36; // 1+2+..+8

        let reply = run(&mut ctx, &req);
        assert_eq!(reply.as_bytes(), &[!(Opcode::WritePage as u8), 36]);
        assert_eq!(ctx.page.fill_index(), 8);
        assert!(ctx.status.application_ready);
        assert!(!ctx.status.delete_flash_requested);
    }

    #[test]
    fn bad_chunk_checksum_schedules_destruction() {
        let mut ctx = BootContext::new();
        let mut req = [0u8; 10];
        req[0] = Opcode::WritePage as u8;
        req[1..9].copy_from_slice(&[1u8, 2, 3, 4, 5, 6, 7, 8]);
        req[9] = 37; // off by one

        let reply = run(&mut ctx, &req);
        // The reply still reports what actually landed in the buffer.
        assert_eq!(reply.as_bytes(), &[!(Opcode::WritePage as u8), 36]);
        assert!(!ctx.status.application_ready);
        assert!(ctx.status.delete_flash_requested);
    }

    #[test]
    fn unknown_opcode_echoes_request_length() {
        let mut ctx = BootContext::new();
        let reply = run(&mut ctx, &[0x42, 0xAA, 0xBB, 0xCC]);
        assert_eq!(reply.as_bytes(), &[UNKNOWN_CMD; 4]);
        // And nothing moved.
        assert!(ctx.status.application_ready);
        assert!(!ctx.status.delete_flash_requested);
        assert_eq!(ctx.page.fill_index(), 0);
    }

    #[test]
    fn truncated_write_is_a_protocol_error() {
        let mut ctx = BootContext::new();
        let reply = run(&mut ctx, &[Opcode::WritePage as u8, 1, 2, 3]);
        assert_eq!(reply.as_bytes(), &[UNKNOWN_CMD; 4]);
        assert_eq!(ctx.page.fill_index(), 0);
    }

    #[test]
    fn empty_request_produces_no_reply() {
        let mut ctx = BootContext::new();
        let reply = run(&mut ctx, &[]);
        assert!(reply.as_bytes().is_empty());
    }

    #[cfg(feature = "cmd-read-buffer")]
    mod read_buffer {
        use super::*;
        use crate::additive_checksum;

        #[test]
        fn returns_the_requested_window() {
            let mut ctx = BootContext::new();
            ctx.page.push_chunk(&[10, 20, 30, 40, 50, 60, 70, 80]);

            let reply = run(&mut ctx, &[Opcode::ReadBuffer as u8, 2, 4]);
            let expected = [20, 30, 40, 50];
            assert_eq!(reply.as_bytes()[0], !(Opcode::ReadBuffer as u8));
            assert_eq!(&reply.as_bytes()[1..5], &expected);
            assert_eq!(reply.as_bytes()[5], additive_checksum(&expected));
        }

        #[test]
        fn rejects_out_of_range_operands() {
            let mut ctx = BootContext::new();
            for req in [
                [Opcode::ReadBuffer as u8, 0, 4],  // start below 1
                [Opcode::ReadBuffer as u8, 1, 0],  // empty window
                [Opcode::ReadBuffer as u8, 1, 11], // window too long
                [Opcode::ReadBuffer as u8, 62, 4], // runs past the page
            ] {
                let reply = run(&mut ctx, &req);
                assert_eq!(reply.as_bytes(), &[UNKNOWN_CMD]);
            }
        }
    }
}
