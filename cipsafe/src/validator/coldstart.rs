//! Cold start of a producing connection.
//!
//! Cold start resets every dynamic variable of the instance and its
//! consumers, seeds the Extended format time stamp state and fires the
//! `ClientOpen` event. It runs on initial open and again whenever a failed
//! multicast connection restarts through a consumer join.

use super::{instance::Consumer, SafetyValidator, ValidatorEvent};
use crate::{
    application::SafetyApplication,
    clock::SafetyClock,
    config::{InitialTimeData, TimeoutMultiplier},
    crc::ConnectionId,
    error::{ErrorKind, ValidatorError},
    time::Timestamp,
    transport::SafetyTransport,
};

impl<C: SafetyClock, T: SafetyTransport, A: SafetyApplication> SafetyValidator<C, T, A> {
    /// Reset the instance's dynamic state and start producing.
    ///
    /// For Extended format the time stamp state is either generated (this
    /// side is the multicast Target and owns the initial time) or taken from
    /// the `negotiated` value carried in the open request/response.
    pub(super) fn cold_start(
        &mut self,
        index: usize,
        instance_id: u16,
        negotiated: Option<InitialTimeData>,
    ) -> Result<Option<InitialTimeData>, ValidatorError> {
        let Some(init) = self.instances[index].init else {
            return Err(self.report(ErrorKind::InstanceIdInvalid, instance_id, index as u32));
        };
        let now = self.clock.now();

        let initial_time = if init.format.is_extended() {
            if init.format.is_multicast() && init.format.is_target() {
                let offset = self.initial_ts_offset;
                self.initial_ts_offset = self.initial_ts_offset.wrapping_add(1);
                Some(InitialTimeData {
                    timestamp: now.timestamp().wrapping_add(offset),
                    rollover: now.high_word().wrapping_add(offset),
                })
            } else {
                match negotiated {
                    Some(negotiated) => Some(negotiated),
                    None => return Err(self.report(ErrorKind::InitialTimeMissing, instance_id, 0)),
                }
            }
        } else {
            None
        };

        let inst = &mut self.instances[index];
        for consumer in &mut inst.consumers {
            consumer.reset_runtime();
        }

        let runtime = &mut inst.runtime;
        runtime.safe_data_ts = Timestamp::ZERO;
        runtime.ping_interval_epi_count = 0;
        // no consumer pending in the round robin sweep
        runtime.rr_consumer_index = init.max_consumer_number;
        runtime.next_tx_time = now;
        runtime.tx_remainder_us = 0;
        runtime.mode_byte.clear_ping_count();
        match initial_time {
            Some(time) => {
                runtime.last_ts_for_rollover = time.timestamp;
                runtime.ts_rollover_count = time.rollover;
                runtime.active_seeds = init.pid_seeds.with_rollover(time.rollover);
            }
            None => {
                runtime.last_ts_for_rollover = Timestamp::ZERO;
                runtime.ts_rollover_count = 0;
                runtime.active_seeds = init.pid_seeds;
            }
        }

        self.process_event(index, instance_id, ValidatorEvent::ClientOpen, 0);
        Ok(initial_time)
    }

    /// Re-initialize one multicast consumer slot and fire `ConsumerJoin`.
    ///
    /// A join into the failed state restarts the connection (the state
    /// machine moves back to Initializing); the producer's time stamp state
    /// is deliberately not reset, joining consumers receive the current
    /// rollover state instead.
    pub(super) fn mcast_reinit(
        &mut self,
        index: usize,
        instance_id: u16,
        consumer_num: u8,
        timeout_multiplier: TimeoutMultiplier,
        consumer_id: ConnectionId,
    ) -> Result<Option<InitialTimeData>, ValidatorError> {
        let Some(init) = self.instances[index].init else {
            return Err(self.report(ErrorKind::InstanceIdInvalid, instance_id, index as u32));
        };

        let slot = consumer_num as usize - 1;
        self.instances[index].consumers[slot] = Consumer::joined(timeout_multiplier, consumer_id);
        self.process_event(index, instance_id, ValidatorEvent::ConsumerJoin, consumer_num);

        if init.format.is_extended() {
            let runtime = &self.instances[index].runtime;
            Ok(Some(InitialTimeData {
                timestamp: runtime.last_ts_for_rollover,
                rollover: runtime.ts_rollover_count,
            }))
        } else {
            Ok(None)
        }
    }
}
