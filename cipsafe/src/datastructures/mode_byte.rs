//! The Mode Byte carried in every produced data message.
//!
//! Layout:
//!
//! | bits | meaning |
//! |------|---------|
//! | 0-1  | Ping_Count, 2 bit counter; a change requests Time Coordination |
//! | 2    | TBD, always 0 |
//! | 3    | complement of bit 2 |
//! | 4    | Run_Idle, 1 = Run |
//! | 5    | complement of bit 4 |
//! | 6-7  | complement of bits 0-1 |
//!
//! The complement bits are the bit replication integrity pattern: a consumer
//! rejects any frame where they do not match. They are recomputed once per
//! production tick after all functional bits are final.

use crate::application::RunIdle;

const PING_COUNT_MASK: u8 = 0x03;
const TBD_BIT: u8 = 0x04;
const N_TBD_BIT: u8 = 0x08;
const RUN_IDLE_BIT: u8 = 0x10;
const N_RUN_IDLE_BIT: u8 = 0x20;
const N_PING_COUNT_SHIFT: u8 = 6;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeByte(u8);

impl ModeByte {
    /// A cleared mode byte: ping count 0, Idle, reserved bits 0, complements
    /// not yet computed.
    pub const fn new() -> Self {
        Self(0)
    }

    /// A mode byte from its raw wire value, e.g. on the consumer side.
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw wire value. Only meaningful after
    /// [`update_redundant_bits`](Self::update_redundant_bits).
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Current 2 bit ping count.
    pub const fn ping_count(self) -> u8 {
        self.0 & PING_COUNT_MASK
    }

    /// Advance the ping count, wrapping within 2 bits. Consumers detect the
    /// change and answer with a Time Coordination message.
    pub fn increment_ping_count(&mut self) {
        let next = (self.ping_count() + 1) & PING_COUNT_MASK;
        self.0 = (self.0 & !PING_COUNT_MASK) | next;
    }

    /// Reset the ping count to 0; used at cold start so the first completed
    /// ping interval is guaranteed to change the field.
    pub fn clear_ping_count(&mut self) {
        self.0 &= !PING_COUNT_MASK;
    }

    pub fn set_run_idle(&mut self, run_idle: RunIdle) {
        match run_idle {
            RunIdle::Run => self.0 |= RUN_IDLE_BIT,
            RunIdle::Idle => self.0 &= !RUN_IDLE_BIT,
        }
    }

    pub const fn run_idle(self) -> RunIdle {
        if self.0 & RUN_IDLE_BIT != 0 {
            RunIdle::Run
        } else {
            RunIdle::Idle
        }
    }

    /// Recompute the complement bits from the functional bits and force the
    /// reserved bit to 0.
    pub fn update_redundant_bits(&mut self) {
        self.0 &= PING_COUNT_MASK | RUN_IDLE_BIT;
        if self.0 & TBD_BIT == 0 {
            self.0 |= N_TBD_BIT;
        }
        if self.0 & RUN_IDLE_BIT == 0 {
            self.0 |= N_RUN_IDLE_BIT;
        }
        self.0 |= (!self.ping_count() & PING_COUNT_MASK) << N_PING_COUNT_SHIFT;
    }

    /// Whether the complement bits match the functional bits; what a consumer
    /// checks on reception.
    pub const fn redundant_bits_ok(self) -> bool {
        let tbd_ok = ((self.0 & TBD_BIT != 0) as u8) + ((self.0 & N_TBD_BIT != 0) as u8) == 1;
        let run_ok =
            ((self.0 & RUN_IDLE_BIT != 0) as u8) + ((self.0 & N_RUN_IDLE_BIT != 0) as u8) == 1;
        let ping_ok =
            (self.0 >> N_PING_COUNT_SHIFT) & PING_COUNT_MASK == !self.0 & PING_COUNT_MASK;
        tbd_ok && run_ok && ping_ok
    }
}
