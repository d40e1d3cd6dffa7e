//! Time Coordination handling.
//!
//! Consumers answer every ping with a Time Coordination message carrying
//! their measured drift per ping interval and their worst case correction
//! value. The producer folds these into the per-consumer time correction
//! value and treats the reply as proof of consumer liveness. All correction
//! arithmetic is 16 bit wraparound, matching the time stamp space.

use super::{SafetyValidator, ValidatorEvent, ValidatorState};
use crate::{
    application::SafetyApplication,
    clock::SafetyClock,
    error::{ErrorKind, ValidatorError},
    time::SystemTime,
    transport::SafetyTransport,
};

/// Valid range of the consumer reported drift per ping interval, in ticks.
/// The upper bound is 40 ms of drift at the 128 µs tick.
const DRIFT_PER_PING_RANGE: core::ops::RangeInclusive<u16> = 1..=313;

impl<C: SafetyClock, T: SafetyTransport, A: SafetyApplication> SafetyValidator<C, T, A> {
    /// Process a Time Coordination reply from `consumer_num`.
    ///
    /// Replies from closed or faulted consumers are dropped silently; a
    /// faulted consumer must rejoin, not resurrect itself. The first reply
    /// on a fresh connection completes the handshake and moves the instance
    /// to Established.
    pub fn handle_time_coordination(
        &mut self,
        instance_id: u16,
        consumer_num: u8,
        drift_per_ping_ticks: u16,
        worst_case_correction_ticks: u16,
    ) -> Result<(), ValidatorError> {
        let Some(index) = self.registry.client_index(instance_id) else {
            return Err(self.report(ErrorKind::InstanceIdInvalid, instance_id, 0));
        };
        let Some(init) = self.instances[index].init else {
            return Err(self.report(ErrorKind::InstanceIdInvalid, instance_id, 0));
        };
        if !DRIFT_PER_PING_RANGE.contains(&drift_per_ping_ticks) {
            return Err(self.report(
                ErrorKind::TimeDriftOutOfRange,
                instance_id,
                drift_per_ping_ticks as u32,
            ));
        }
        if consumer_num == 0 || consumer_num > init.max_consumer_number {
            return Err(self.report(
                ErrorKind::ConsumerNumOutOfRange,
                instance_id,
                consumer_num as u32,
            ));
        }

        let state = self.instances[index].state;
        let was_active;
        {
            let consumer = &mut self.instances[index].consumers[consumer_num as usize - 1];
            if !consumer.open || consumer.faulted {
                log::debug!(
                    "instance {instance_id}: dropping tcoo from inactive consumer {consumer_num}"
                );
                return Ok(());
            }

            // The reply is one or more pings old; project the consumer's
            // worst case drift over the pings it has been in flight.
            let drift = consumer
                .pings_since_last_tcoo
                .wrapping_add(1)
                .wrapping_mul(drift_per_ping_ticks)
                .wrapping_add(1);
            let current = consumer.time_correction_ticks;
            let decreased = current
                .wrapping_sub(worst_case_correction_ticks)
                .wrapping_sub(drift)
                & 0x8000
                == 0;
            was_active = consumer.active;
            consumer.time_correction_ticks = if was_active && decreased {
                current.wrapping_sub(drift)
            } else {
                worst_case_correction_ticks
            };
            consumer.pings_since_last_tcoo = 0;
            consumer.active = true;
            log::debug!(
                "instance {instance_id}: tcoo from consumer {consumer_num}, correction {} ticks",
                consumer.time_correction_ticks
            );
        }

        if state == ValidatorState::Initializing {
            self.process_event(
                index,
                instance_id,
                ValidatorEvent::FirstHandshakeComplete,
                consumer_num,
            );
        }
        if !was_active {
            self.process_event(index, instance_id, ValidatorEvent::ConsumerActive, consumer_num);
        }
        Ok(())
    }

    /// Charge one ping interval against `slot` and fault it on timeout.
    ///
    /// Runs once per ping interval per consumer, at the liveness check EPI.
    /// The timeout threshold is `Timeout_Multiplier.PI + 2` ping intervals
    /// without a Time Coordination reply.
    pub(super) fn consumer_timeout_tick(
        &mut self,
        index: usize,
        instance_id: u16,
        slot: usize,
        now: SystemTime,
    ) {
        let is_multicast = match self.instances[index].init {
            Some(init) => init.format.is_multicast(),
            None => return,
        };
        let threshold;
        {
            let consumer = &mut self.instances[index].consumers[slot];
            if !consumer.is_live() {
                return;
            }
            consumer.pings_since_last_tcoo = consumer.pings_since_last_tcoo.saturating_add(1);
            threshold = consumer.timeout_multiplier.ping_interval as u16 + 2;
            if consumer.pings_since_last_tcoo < threshold {
                return;
            }
            consumer.faulted = true;
            consumer.active = false;
        }

        self.fault_counter = self.fault_counter.wrapping_add(1);
        self.report(ErrorKind::TcooTimeout, instance_id, slot as u32 + 1);
        if is_multicast {
            self.quarantine_start(index, slot, now);
        }

        let consumer_num = slot as u8 + 1;
        if self.instances[index].has_live_consumer() {
            self.process_event(index, instance_id, ValidatorEvent::ConsumerFaulted, consumer_num);
        } else {
            self.process_event(
                index,
                instance_id,
                ValidatorEvent::AllConsumersFaulted,
                consumer_num,
            );
        }
    }
}
