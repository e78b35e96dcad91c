//! Top-level scheduler: the bootloader's main loop body.
//!
//! Drives the init handshake, the communication-settle throttle and the
//! exit countdown, and forwards bus events to the dispatcher. The loop
//! itself lives in the firmware binary:
//!
//! ```ignore
//! let mut boot = BootMachine::new(bus, flash, led);
//! let handoff = loop {
//!     if let Some(handoff) = boot.poll() {
//!         break handoff;
//!     }
//! };
//! // indirect jump to handoff.entry, never returns
//! ```

use embedded_hal::digital::v2::OutputPin;

use crate::bus::{TwiEvent, TwiSlave};
use crate::consts::{APP_ENTRY, EXIT_TOGGLES, SETTLE_TICKS, TOGGLE_TICKS};
use crate::context::BootContext;
use crate::flash::WriteErase;
use crate::protocol::{CommandBuffer, Reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Blinking and counting down until the master completes the handshake.
    AwaitingInit,
    /// Handshake done; commands flow and pages get committed.
    Active,
    /// Terminal: control belongs to the application.
    Exiting,
}

/// Jump target handed back once the scheduler is done. The integrator
/// performs the indirect jump; it does not return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Byte address of the application entry slot.
    pub entry: u16,
}

pub struct BootMachine<B, F, L> {
    bus: B,
    flash: F,
    led: L,
    led_on: bool,
    ctx: BootContext,
    command: CommandBuffer,
    state: State,
    toggle_timer: u16,
    settle: u16,
    exit_countdown: u8,
}

impl<B, F, L> BootMachine<B, F, L>
where
    B: TwiSlave,
    F: WriteErase,
    L: OutputPin,
{
    pub fn new(bus: B, flash: F, led: L) -> Self {
        Self {
            bus,
            flash,
            led,
            led_on: false,
            ctx: BootContext::new(),
            command: CommandBuffer::new(),
            state: State::AwaitingInit,
            toggle_timer: 0,
            settle: SETTLE_TICKS,
            exit_countdown: EXIT_TOGGLES,
        }
    }

    /// One pass of the main loop.
    ///
    /// Bus events are drained on every pass, whatever the state. Returns
    /// the application handoff once there is nothing left to do here.
    pub fn poll(&mut self) -> Option<Handoff> {
        self.poll_bus();

        match self.state {
            State::AwaitingInit => self.await_init(),
            State::Active => self.run_active(),
            State::Exiting => Some(Handoff { entry: APP_ENTRY }),
        }
    }

    /// Blink until the master shows up; give up and run the application if
    /// it never does.
    fn await_init(&mut self) -> Option<Handoff> {
        if self.ctx.status.handshake_complete() {
            boot_log!(info, "handshake complete, accepting commands");
            self.state = State::Active;
            return None;
        }

        self.toggle_timer += 1;
        if self.toggle_timer >= TOGGLE_TICKS {
            self.toggle_timer = 0;
            self.toggle_led();
            if self.exit_countdown == 0 {
                boot_log!(info, "no master, running the resident application");
                self.state = State::Exiting;
                return Some(Handoff { entry: APP_ENTRY });
            }
            self.exit_countdown -= 1;
        }
        None
    }

    /// Throttled by the settle counter so a reply finishes transmitting
    /// before any flash-affecting action begins.
    fn run_active(&mut self) -> Option<Handoff> {
        if self.settle > 0 {
            self.settle -= 1;
            return None;
        }
        self.settle = SETTLE_TICKS;

        let exit_requested = self.ctx.status.exit_requested;
        let application_ready = self.ctx.status.application_ready;
        let delete_requested = self.ctx.status.delete_flash_requested;

        if exit_requested && application_ready {
            boot_log!(info, "exiting to the application");
            self.state = State::Exiting;
            return Some(Handoff { entry: APP_ENTRY });
        } else if exit_requested {
            // No trustworthy image: wipe it. The redirect vector brings the
            // device back into the bootloader after the jump.
            self.ctx.erase_application(&mut self.flash);
            self.state = State::Exiting;
            return Some(Handoff { entry: APP_ENTRY });
        } else if delete_requested {
            self.led.set_high().ok();
            self.led_on = true;
            self.ctx.erase_application(&mut self.flash);
            self.state = State::Exiting;
            return Some(Handoff { entry: APP_ENTRY });
        } else if self.ctx.page.is_complete() {
            self.toggle_led();
            self.ctx.commit_page(&mut self.flash);
            self.ctx.advance_page();
        }
        None
    }

    /// Drain at most one pending bus event into the dispatcher.
    fn poll_bus(&mut self) {
        match self.bus.poll() {
            Some(TwiEvent::Receive { len }) => {
                self.command.reset();
                for _ in 0..len {
                    let byte = self.bus.receive_byte();
                    self.command.push(byte);
                }
            }
            Some(TwiEvent::Request) => {
                if self.command.is_empty() {
                    return;
                }
                let mut reply = Reply::new();
                self.ctx.dispatch(&self.command, &mut reply);
                for &byte in reply.as_bytes() {
                    self.bus.transmit_byte(byte);
                }
                self.command.reset();
            }
            None => {}
        }
    }

    fn toggle_led(&mut self) {
        if self.led_on {
            self.led.set_low().ok();
        } else {
            self.led.set_high().ok();
        }
        self.led_on = !self.led_on;
    }

    /// Commands have been accepted since the init handshake completed.
    pub fn is_active(&self) -> bool {
        self.state == State::Active
    }

    pub fn context(&self) -> &BootContext {
        &self.ctx
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn flash_ref(&self) -> &F {
        &self.flash
    }
}
