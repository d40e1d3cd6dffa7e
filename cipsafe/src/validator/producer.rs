//! The EPI paced production engine.
//!
//! [`produce`](SafetyValidator::produce) is the periodic entry point of an
//! instance; the caller invokes it at least once per EPI (more often is
//! fine, a call before the scheduled transmit time is a no-op). Each
//! production tick captures the payload and time stamp, runs the per ping
//! interval liveness bookkeeping and hands one serialized frame to the
//! transport. The scheduler accumulates the sub tick EPI remainder and,
//! when the caller falls behind by more than one EPI, resynchronizes to the
//! current time instead of bursting the missed frames.

use super::{instance::InitInfo, SafetyValidator, StackState};
use crate::{
    application::{DeviceStatus, RunIdle, SafetyApplication},
    clock::SafetyClock,
    config::LIVENESS_CHECK_EPI,
    crc::CrcSeeds,
    datastructures::{DataMessage, TimeCorrection},
    error::{ErrorKind, ValidatorError},
    time::{SystemTime, Timestamp, TICK_US},
    transport::SafetyTransport,
};

impl<C: SafetyClock, T: SafetyTransport, A: SafetyApplication> SafetyValidator<C, T, A> {
    /// Run one scheduling step of `instance_id`, producing a frame when its
    /// transmit time has come.
    ///
    /// Producing on a halted stack is a fail-safe error. Ids that do not
    /// resolve to an allocated client instance are ignored so a periodic
    /// driver can sweep the whole id space.
    pub fn produce(&mut self, instance_id: u16) -> Result<(), ValidatorError> {
        if self.stack_state != StackState::Running {
            return Err(self.report(ErrorKind::StackNotRunning, instance_id, 0));
        }
        let Some(index) = self.registry.client_index(instance_id) else {
            return Ok(());
        };
        let Some(init) = self.instances[index].init else {
            return Ok(());
        };
        if !self.instances[index].is_producing_state() {
            return Ok(());
        }

        let now = self.clock.now();
        if now.is_at_or_after(self.instances[index].runtime.next_tx_time) {
            self.reschedule(index, instance_id, now, &init);
            self.produce_frame(index, instance_id, now, &init)?;
        }

        if let Some(consumer_num) = self.quarantine_due(index, now) {
            log::info!(
                "instance {instance_id}: quarantine of consumer {consumer_num} expired, closing"
            );
            self.close(instance_id, consumer_num, true)?;
        }
        Ok(())
    }

    /// Advance the transmit schedule by one EPI, carrying the sub tick
    /// remainder.
    fn reschedule(&mut self, index: usize, instance_id: u16, now: SystemTime, init: &InitInfo) {
        let runtime = &mut self.instances[index].runtime;
        let mut remainder = runtime.tx_remainder_us + init.constants.epi_remainder_us;
        let mut ticks = init.constants.epi_ticks;
        if remainder >= TICK_US {
            remainder -= TICK_US;
            ticks += 1;
        }
        let mut next = runtime.next_tx_time.wrapping_add_ticks(ticks);
        if now.is_at_or_after(next) {
            // fell behind by a full EPI; resynchronize rather than burst
            log::warn!("instance {instance_id}: production fell behind, resynchronizing");
            next = now.wrapping_add_ticks(init.constants.epi_ticks);
            remainder = 0;
        }
        runtime.next_tx_time = next;
        runtime.tx_remainder_us = remainder;
    }

    fn produce_frame(
        &mut self,
        index: usize,
        instance_id: u16,
        now: SystemTime,
        init: &InitInfo,
    ) -> Result<(), ValidatorError> {
        let (len, mut run_idle) = match self.app.output_data(
            init.connection_point,
            &mut self.payload_buffer[..init.payload_len],
        ) {
            Ok(result) => result,
            Err(_) => {
                self.report(ErrorKind::OutputDataUnavailable, instance_id, 0);
                return Ok(());
            }
        };
        if len != init.payload_len {
            self.report(ErrorKind::OutputDataUnavailable, instance_id, len as u32);
            return Ok(());
        }
        if self.app.device_status() != DeviceStatus::Executing {
            run_idle = RunIdle::Idle;
        }

        // ping interval bookkeeping; epi_count is the pre-wrap value so the
        // liveness check still runs when the multiplier equals the check EPI
        let epi_count = {
            let runtime = &mut self.instances[index].runtime;
            runtime.safe_data_ts = now.timestamp();
            let epi_count = runtime.ping_interval_epi_count + 1;
            if epi_count >= init.constants.ping_interval_epi_multiplier {
                runtime.mode_byte.increment_ping_count();
                runtime.ping_interval_epi_count = 0;
            } else {
                runtime.ping_interval_epi_count = epi_count;
            }
            epi_count
        };

        if init.format.is_multicast() {
            self.produce_multicast(index, instance_id, now, init, epi_count, run_idle, len)
        } else {
            self.produce_single_cast(index, instance_id, now, init, epi_count, run_idle, len)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn produce_single_cast(
        &mut self,
        index: usize,
        instance_id: u16,
        now: SystemTime,
        init: &InitInfo,
        epi_count: u16,
        run_idle: RunIdle,
        payload_len: usize,
    ) -> Result<(), ValidatorError> {
        if epi_count == LIVENESS_CHECK_EPI {
            self.consumer_timeout_tick(index, instance_id, 0, now);
            if !self.instances[index].is_producing_state() {
                return Ok(());
            }
        }

        let active = self.instances[index].consumers[0].active;
        let (timestamp, run_idle) = if active {
            let correction = self.instances[index].consumers[0].time_correction_ticks;
            let ts = self.instances[index]
                .runtime
                .safe_data_ts
                .wrapping_add(correction);
            (ts, run_idle)
        } else {
            // no handshake yet; the consumer ignores the time stamp and must
            // treat the data as idle
            (Timestamp::ZERO, RunIdle::Idle)
        };

        let frame_len = self.serialize_data(index, init, timestamp, run_idle, active, payload_len);
        self.send_frame(instance_id, frame_len);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn produce_multicast(
        &mut self,
        index: usize,
        instance_id: u16,
        now: SystemTime,
        init: &InitInfo,
        epi_count: u16,
        run_idle: RunIdle,
        payload_len: usize,
    ) -> Result<(), ValidatorError> {
        if epi_count == LIVENESS_CHECK_EPI {
            // a new round robin sweep starts at the liveness check EPI
            self.set_rr_consumer_index(index, instance_id, 0)?;
        }

        let rr = self.instances[index].runtime.rr_consumer_index;
        let serviced = rr < init.max_consumer_number;
        if serviced {
            self.consumer_timeout_tick(index, instance_id, rr as usize, now);
            if !self.instances[index].is_producing_state() {
                return Ok(());
            }
        }

        // the multicast data message carries the uncorrected time stamp;
        // per-consumer correction travels in the Time Correction sub-message
        let timestamp = self.instances[index].runtime.safe_data_ts;
        let frame_len = self.serialize_data(index, init, timestamp, run_idle, true, payload_len);

        let (tcorr, tcorr_seeds) = if serviced {
            let consumer = &self.instances[index].consumers[rr as usize];
            if consumer.is_live() && consumer.active {
                (
                    TimeCorrection {
                        consumer_num: rr + 1,
                        active: true,
                        correction_ticks: consumer.time_correction_ticks,
                    },
                    consumer.cid_seeds,
                )
            } else {
                (TimeCorrection::idle(), init.pid_seeds)
            }
        } else {
            (TimeCorrection::idle(), init.pid_seeds)
        };
        let tcorr_len = tcorr
            .serialize(
                init.format.layer,
                tcorr_seeds,
                &mut self.packet_buffer[frame_len..],
            )
            .unwrap_or_default();
        if serviced {
            self.set_rr_consumer_index(index, instance_id, rr + 1)?;
        }

        self.send_frame(instance_id, frame_len + tcorr_len);
        Ok(())
    }

    /// The CRC seeds of the next frame, updating the rollover state for
    /// Extended format.
    fn frame_seeds(
        &mut self,
        index: usize,
        init: &InitInfo,
        timestamp: Timestamp,
        active: bool,
    ) -> CrcSeeds {
        if !init.format.is_extended() {
            return init.pid_seeds;
        }
        if !active {
            // initialization frames carry time stamp zero and are checked
            // against a zero rollover seed
            return init.pid_seeds.with_rollover(0);
        }
        let runtime = &mut self.instances[index].runtime;
        if timestamp.rolled_over_from(runtime.last_ts_for_rollover) {
            runtime.ts_rollover_count = runtime.ts_rollover_count.wrapping_add(1);
            runtime.active_seeds = init.pid_seeds.with_rollover(runtime.ts_rollover_count);
            log::debug!(
                "rollover {} on instance index {index}",
                runtime.ts_rollover_count
            );
        }
        runtime.last_ts_for_rollover = timestamp;
        runtime.active_seeds
    }

    /// Serialize the data message into the packet buffer, returning the
    /// frame length (0 on the unreachable serialization failure).
    #[allow(clippy::too_many_arguments)]
    fn serialize_data(
        &mut self,
        index: usize,
        init: &InitInfo,
        timestamp: Timestamp,
        run_idle: RunIdle,
        active: bool,
        payload_len: usize,
    ) -> usize {
        let seeds = self.frame_seeds(index, init, timestamp, active);
        let mut mode_byte = self.instances[index].runtime.mode_byte;
        mode_byte.set_run_idle(run_idle);
        mode_byte.update_redundant_bits();

        let message = DataMessage {
            mode_byte,
            payload: &self.payload_buffer[..payload_len],
            timestamp,
        };
        // payload length was validated at open, the buffer fits any frame
        message
            .serialize(init.format, seeds, &mut self.packet_buffer)
            .unwrap_or_default()
    }

    fn send_frame(&mut self, instance_id: u16, frame_len: usize) {
        if frame_len == 0 {
            return;
        }
        if self
            .transport
            .send(instance_id, &self.packet_buffer[..frame_len])
            .is_err()
        {
            self.report(ErrorKind::TransportSendFailure, instance_id, 0);
        } else {
            log::trace!("instance {instance_id}: sent {frame_len} byte frame");
        }
    }
}
