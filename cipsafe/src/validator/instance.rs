//! Per-instance state of a Safety Validator Client.
//!
//! An instance owns all of its state: the configuration captured at open
//! time, one record per possible consumer and the producer's dynamic
//! variables. Consumer records are reset wholesale when the instance is
//! deallocated, never reallocated individually across instances.

use arrayvec::ArrayVec;

use super::{state::ValidatorState, MAX_CONSUMERS_MULTICAST};
use crate::{
    config::{MessageFormat, TimeoutMultiplier, TimingConstants},
    crc::{ConnectionId, CrcSeeds},
    datastructures::ModeByte,
    error::ValidatorError,
    time::{SystemTime, Timestamp},
};

/// Configuration and derived constants captured when the connection opens.
#[derive(Copy, Clone, Debug)]
pub(crate) struct InitInfo {
    pub format: MessageFormat,
    pub max_consumer_number: u8,
    pub connection_point: u16,
    pub constants: TimingConstants,
    pub payload_len: usize,
    /// Base CRC seeds derived from the producer identifier.
    pub pid_seeds: CrcSeeds,
}

/// One consumer of the producing connection.
#[derive(Clone, Debug, Default)]
pub(crate) struct Consumer {
    pub open: bool,
    pub faulted: bool,
    pub active: bool,
    pub timeout_multiplier: TimeoutMultiplier,
    pub id: ConnectionId,
    /// CRC seeds of the Time Correction section, derived from the CID.
    pub cid_seeds: CrcSeeds,
    /// Consumer time correction value in 128 µs ticks.
    pub time_correction_ticks: u16,
    /// Ping intervals elapsed since the last Time Coordination reply.
    pub pings_since_last_tcoo: u16,
    /// Quarantine expiry of this slot; set only while faulted and open.
    pub quarantine_expiry: Option<SystemTime>,
}

impl Consumer {
    /// A freshly joined consumer, runtime state cleared.
    pub fn joined(timeout_multiplier: TimeoutMultiplier, id: ConnectionId) -> Self {
        Self {
            open: true,
            timeout_multiplier,
            id,
            cid_seeds: CrcSeeds::from_id(id),
            ..Self::default()
        }
    }

    /// Reset the dynamic part (cold start step for this consumer); the open
    /// flag, timeout multiplier and identifiers are configuration and stay.
    pub fn reset_runtime(&mut self) {
        self.faulted = false;
        self.active = false;
        self.time_correction_ticks = 0;
        self.pings_since_last_tcoo = 0;
        self.quarantine_expiry = None;
    }

    /// Whether this consumer still counts towards connection liveness.
    pub fn is_live(&self) -> bool {
        self.open && !self.faulted
    }
}

/// Dynamic producer variables of an instance.
#[derive(Clone, Debug, Default)]
pub(crate) struct ProducerRuntime {
    /// Low 16 bits of the system time captured at the start of the current
    /// production tick.
    pub safe_data_ts: Timestamp,
    /// EPIs elapsed in the current ping interval.
    pub ping_interval_epi_count: u16,
    /// Round robin pointer of the multicast timeout / Time Correction sweep;
    /// equal to Max_Consumer_Number when no consumer is pending.
    pub rr_consumer_index: u8,
    /// Scheduled time of the next production.
    pub next_tx_time: SystemTime,
    /// Accumulated sub-tick EPI remainder in microseconds.
    pub tx_remainder_us: u32,
    pub mode_byte: ModeByte,
    /// Last produced time stamp, for 16 bit rollover detection.
    pub last_ts_for_rollover: Timestamp,
    /// Number of detected time stamp rollovers (Extended format).
    pub ts_rollover_count: u16,
    /// Seeds currently used for data message CRCs; for Extended format these
    /// include the rollover count.
    pub active_seeds: CrcSeeds,
}

/// One slot of the client instance arena.
#[derive(Debug, Default)]
pub(crate) struct ClientInstance {
    pub allocated: bool,
    pub state: ValidatorState,
    pub init: Option<InitInfo>,
    pub consumers: ArrayVec<Consumer, MAX_CONSUMERS_MULTICAST>,
    pub runtime: ProducerRuntime,
    pub last_error: Option<ValidatorError>,
}

impl ClientInstance {
    /// Reset the slot to its unallocated state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether any consumer is still open and unfaulted.
    pub fn has_live_consumer(&self) -> bool {
        self.consumers.iter().any(Consumer::is_live)
    }

    /// Whether the instance currently produces frames.
    pub fn is_producing_state(&self) -> bool {
        matches!(
            self.state,
            ValidatorState::Initializing | ValidatorState::Established
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_consumer_is_live_with_cleared_runtime() {
        let id = ConnectionId {
            vendor_id: 7,
            device_serial: 8,
            connection_serial: 9,
        };
        let consumer = Consumer::joined(TimeoutMultiplier::default(), id);
        assert!(consumer.is_live());
        assert!(!consumer.active);
        assert_eq!(consumer.time_correction_ticks, 0);
        assert_eq!(consumer.cid_seeds, CrcSeeds::from_id(id));
    }

    #[test]
    fn reset_runtime_keeps_configuration() {
        let id = ConnectionId {
            vendor_id: 1,
            device_serial: 2,
            connection_serial: 3,
        };
        let mut consumer = Consumer::joined(
            TimeoutMultiplier {
                ping_interval: 4,
                extended: None,
            },
            id,
        );
        consumer.active = true;
        consumer.faulted = true;
        consumer.pings_since_last_tcoo = 11;
        consumer.reset_runtime();

        assert!(consumer.open);
        assert_eq!(consumer.timeout_multiplier.ping_interval, 4);
        assert_eq!(consumer.id, id);
        assert!(!consumer.active);
        assert!(!consumer.faulted);
        assert_eq!(consumer.pings_since_last_tcoo, 0);
    }

    #[test]
    fn liveness_requires_open_and_unfaulted() {
        let mut instance = ClientInstance::default();
        assert!(!instance.has_live_consumer());

        let mut consumer = Consumer::joined(TimeoutMultiplier::default(), ConnectionId::default());
        consumer.faulted = true;
        instance.consumers.push(consumer);
        assert!(!instance.has_live_consumer());

        instance.consumers[0].faulted = false;
        assert!(instance.has_live_consumer());
    }
}
