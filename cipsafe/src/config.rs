//! Configuration of a producing safety connection.
//!
//! A connection's open parameters arrive from the explicit messaging layer
//! (Forward_Open) already parsed; this module validates them and derives the
//! constants the production engine runs on. Dynamic per-connection state is
//! kept in [`crate::validator`], mirroring the split between configuration
//! and runtime data used throughout the crate.

use crate::{
    crc::ConnectionId,
    error::ErrorKind,
    time::{Timestamp, TICK_US},
};

/// Whether the connection produces to one consumer or to a multicast group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cast {
    SingleCast,
    MultiCast,
}

/// The safety message layer: Base (16 bit protection) or Extended (with time
/// stamp rollover tracking and 24 bit CRC sections).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Base,
    Extended,
}

/// The data length class: Short frames carry 1-2 payload bytes, Long frames
/// 3 bytes up to [`MAX_LONG_PAYLOAD`](crate::datastructures::MAX_LONG_PAYLOAD)
/// and add complemented payload protection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Length {
    Short,
    Long,
}

/// Which side of the connection this device played during connection
/// establishment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Originator,
    Target,
}

/// The format capability set of one producing connection.
///
/// The four axes are orthogonal; all sixteen combinations are legal wire
/// formats. This replaces the bit packed format byte of the explicit
/// messaging layer with individually queryable fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageFormat {
    pub cast: Cast,
    pub layer: Layer,
    pub length: Length,
    pub role: Role,
}

impl MessageFormat {
    pub fn is_multicast(self) -> bool {
        self.cast == Cast::MultiCast
    }

    pub fn is_extended(self) -> bool {
        self.layer == Layer::Extended
    }

    pub fn is_long(self) -> bool {
        self.length == Length::Long
    }

    pub fn is_target(self) -> bool {
        self.role == Role::Target
    }
}

/// Connection timeout multiplier of one consumer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TimeoutMultiplier {
    /// Ping interval form: a consumer is considered lost after
    /// `ping_interval + 2` ping intervals without a Time Coordination reply.
    pub ping_interval: u8,
    /// Extended format network multiplier, present only when the Extended
    /// time expectation checks are enabled for this connection.
    pub extended: Option<u8>,
}

/// Initial time stamp and rollover value negotiated during Forward_Open for
/// Extended format connections.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InitialTimeData {
    pub timestamp: Timestamp,
    pub rollover: u16,
}

/// Open parameters of a producing safety connection, as handed over by the
/// explicit messaging layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClientOpenParams {
    /// Wire format of the produced frames.
    pub format: MessageFormat,
    /// Highest consumer number of this connection: 1 for single-cast, up to
    /// 15 for multicast.
    pub max_consumer_number: u8,
    /// Producing connection point (assembly instance) the payload is read
    /// from.
    pub connection_point: u16,
    /// Originator to target RPI in microseconds.
    pub rpi_o2t_us: u32,
    /// Target to originator RPI in microseconds.
    pub rpi_t2o_us: u32,
    /// Number of EPIs per ping interval.
    pub ping_interval_epi_multiplier: u16,
    /// Timeout multiplier of the first consumer.
    pub timeout_multiplier: TimeoutMultiplier,
    /// Producer identifier, CRC seed input of the data sections.
    pub producer_id: ConnectionId,
    /// Consumer identifier of the first consumer, CRC seed input of the Time
    /// Correction section.
    pub consumer_id: ConnectionId,
    /// Produced payload size in bytes.
    pub payload_len: usize,
    /// Negotiated initial time data. Required for Extended format except for
    /// the multicast Target, which generates it (see cold start).
    pub initial_time: Option<InitialTimeData>,
}

impl ClientOpenParams {
    /// The produce-direction RPI, i.e. the EPI of this connection: the
    /// Originator produces O→T, the Target produces T→O.
    pub fn epi_us(&self) -> u32 {
        match self.format.role {
            Role::Originator => self.rpi_o2t_us,
            Role::Target => self.rpi_t2o_us,
        }
    }
}

/// Smallest accepted EPI in microseconds.
pub const MIN_EPI_US: u32 = 100;
/// Largest accepted EPI in microseconds.
pub const MAX_EPI_US: u32 = 1_000_000;

/// EPI count within a ping interval at which the per-consumer liveness check
/// runs (and, for multicast, at which a new round robin sweep starts).
pub(crate) const LIVENESS_CHECK_EPI: u16 = 8;

/// Timing constants derived from validated open parameters.
///
/// The EPI is carried both in microseconds and in a 128 µs tick form with a
/// sub-tick remainder; the production scheduler accumulates the remainder so
/// the long-run frame rate matches the configured EPI exactly instead of
/// drifting by the truncation error every tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConstants {
    /// EPI in microseconds.
    pub epi_us: u32,
    /// Whole 128 µs ticks per EPI.
    pub epi_ticks: u32,
    /// Truncated remainder of the EPI in microseconds, `< TICK_US`.
    pub epi_remainder_us: u32,
    /// Number of EPIs per ping interval.
    pub ping_interval_epi_multiplier: u16,
    /// Ping interval rounded up to whole ticks, used for quarantine expiry.
    pub ping_interval_ticks: u32,
}

impl TimingConstants {
    /// Validate the timing related open parameters and derive the constants.
    pub fn new(params: &ClientOpenParams) -> Result<Self, ErrorKind> {
        let epi_us = params.epi_us();
        if !(MIN_EPI_US..=MAX_EPI_US).contains(&epi_us) {
            return Err(ErrorKind::EpiOutOfRange);
        }
        // A multiplier below the liveness check offset would silently disable
        // timeout detection.
        if params.ping_interval_epi_multiplier < LIVENESS_CHECK_EPI {
            return Err(ErrorKind::PingMultiplierOutOfRange);
        }
        // The round robin sweep services one consumer per EPI and restarts
        // every multiplier EPIs; consumer slots past that count would never
        // be timeout checked.
        if params.max_consumer_number as u16 > params.ping_interval_epi_multiplier {
            return Err(ErrorKind::PingMultiplierOutOfRange);
        }

        let multiplier = params.ping_interval_epi_multiplier;
        let ping_interval_us = epi_us as u64 * multiplier as u64;
        let ping_interval_ticks =
            ((ping_interval_us + (TICK_US as u64 - 1)) / TICK_US as u64) as u32;

        Ok(Self {
            epi_us,
            epi_ticks: epi_us / TICK_US,
            epi_remainder_us: epi_us % TICK_US,
            ping_interval_epi_multiplier: multiplier,
            ping_interval_ticks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ClientOpenParams {
        ClientOpenParams {
            format: MessageFormat {
                cast: Cast::SingleCast,
                layer: Layer::Base,
                length: Length::Short,
                role: Role::Originator,
            },
            max_consumer_number: 1,
            connection_point: 300,
            rpi_o2t_us: 10_000,
            rpi_t2o_us: 20_000,
            ping_interval_epi_multiplier: 10,
            timeout_multiplier: TimeoutMultiplier {
                ping_interval: 2,
                extended: None,
            },
            producer_id: ConnectionId::default(),
            consumer_id: ConnectionId::default(),
            payload_len: 1,
            initial_time: None,
        }
    }

    #[test]
    fn epi_follows_produce_direction() {
        let mut p = params();
        assert_eq!(p.epi_us(), 10_000);
        p.format.role = Role::Target;
        assert_eq!(p.epi_us(), 20_000);
    }

    #[test]
    fn epi_tick_split() {
        let constants = TimingConstants::new(&params()).unwrap();
        assert_eq!(constants.epi_ticks, 78);
        assert_eq!(constants.epi_remainder_us, 16);
        // ping interval: 100 ms → 781.25 ticks, rounded up
        assert_eq!(constants.ping_interval_ticks, 782);
    }

    #[test]
    fn epi_bounds_are_enforced() {
        let mut p = params();
        p.rpi_o2t_us = 99;
        assert_eq!(
            TimingConstants::new(&p).unwrap_err(),
            ErrorKind::EpiOutOfRange
        );
        p.rpi_o2t_us = 1_000_001;
        assert_eq!(
            TimingConstants::new(&p).unwrap_err(),
            ErrorKind::EpiOutOfRange
        );
        p.rpi_o2t_us = 1_000_000;
        assert!(TimingConstants::new(&p).is_ok());
    }

    #[test]
    fn tiny_ping_multiplier_is_rejected() {
        let mut p = params();
        p.ping_interval_epi_multiplier = 7;
        assert_eq!(
            TimingConstants::new(&p).unwrap_err(),
            ErrorKind::PingMultiplierOutOfRange
        );
    }

    #[test]
    fn consumer_count_may_not_exceed_ping_multiplier() {
        let mut p = params();
        p.format.cast = Cast::MultiCast;
        p.ping_interval_epi_multiplier = 8;
        p.max_consumer_number = 9;
        assert_eq!(
            TimingConstants::new(&p).unwrap_err(),
            ErrorKind::PingMultiplierOutOfRange
        );
        p.max_consumer_number = 8;
        assert!(TimingConstants::new(&p).is_ok());
    }
}
