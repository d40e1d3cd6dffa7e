//! Quarantine of faulted multicast consumers.
//!
//! A faulted consumer's slot must not be handed to a rejoining consumer
//! while late frames of the faulted connection can still arrive. The slot
//! stays quarantined for one full timeout window after the fault; joins
//! during that window are refused with a recoverable error and the producer
//! closes the slot once the window has passed.

use super::SafetyValidator;
use crate::{
    application::SafetyApplication, clock::SafetyClock, time::SystemTime,
    transport::SafetyTransport,
};

impl<C: SafetyClock, T: SafetyTransport, A: SafetyApplication> SafetyValidator<C, T, A> {
    /// Start the quarantine window of `slot`, one timeout threshold worth of
    /// ping intervals from `now`.
    pub(super) fn quarantine_start(&mut self, index: usize, slot: usize, now: SystemTime) {
        let Some(init) = self.instances[index].init else {
            return;
        };
        let consumer = &mut self.instances[index].consumers[slot];
        let window = (consumer.timeout_multiplier.ping_interval as u32 + 2)
            * init.constants.ping_interval_ticks;
        consumer.quarantine_expiry = Some(now.wrapping_add_ticks(window));
    }

    /// The first quarantined consumer whose window has passed, as a 1-based
    /// consumer number. Only consulted while the instance produces.
    pub(super) fn quarantine_due(&self, index: usize, now: SystemTime) -> Option<u8> {
        let inst = &self.instances[index];
        if !inst.is_producing_state() {
            return None;
        }
        inst.consumers.iter().enumerate().find_map(|(slot, consumer)| {
            let expiry = consumer.quarantine_expiry?;
            if consumer.open && consumer.faulted && now.is_at_or_after(expiry) {
                Some(slot as u8 + 1)
            } else {
                None
            }
        })
    }
}
