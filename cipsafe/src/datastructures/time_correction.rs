//! The Time Correction sub-message appended to multicast data frames.
//!
//! Each production tick addresses at most one multicast consumer; the
//! sub-message carries that consumer's time correction value. Layout:
//!
//! ```text
//! [MCast Byte][correction lo][correction hi][complement of MCast Byte][CRC]
//! ```
//!
//! The MCast Byte holds the addressed consumer number (bits 0-3, 0 = no
//! consumer due this tick), the multicast active flag (bit 4) and an even
//! parity bit (bit 7); bits 5-6 are reserved 0. The CRC is seeded from the
//! addressed consumer's CID: CRC-S3 for Base format, 3 bytes of CRC-S5 for
//! Extended.

use super::WireFormatError;
use crate::{
    config::Layer,
    crc::{crc_s3, crc_s5, CrcSeeds},
};

const CONSUMER_NUM_MASK: u8 = 0x0F;
const ACTIVE_BIT: u8 = 0x10;
const PARITY_BIT: u8 = 0x80;

/// A Time Correction sub-message ready for serialization.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeCorrection {
    /// Addressed consumer number, 1..=15, or 0 when no consumer is due.
    pub consumer_num: u8,
    /// Whether the addressed consumer's correction value is valid.
    pub active: bool,
    /// Correction value in 128 µs ticks.
    pub correction_ticks: u16,
}

impl TimeCorrection {
    /// Wire size with a Base format CRC-S3.
    pub const WIRE_SIZE_BASE: usize = 6;
    /// Wire size with an Extended format CRC-S5.
    pub const WIRE_SIZE_EXTENDED: usize = 7;

    /// The idle block sent when no open, unfaulted, active consumer is due
    /// this tick.
    pub const fn idle() -> Self {
        Self {
            consumer_num: 0,
            active: false,
            correction_ticks: 0,
        }
    }

    /// The byte size on the wire for the given layer.
    pub const fn wire_size(layer: Layer) -> usize {
        match layer {
            Layer::Base => Self::WIRE_SIZE_BASE,
            Layer::Extended => Self::WIRE_SIZE_EXTENDED,
        }
    }

    fn mcast_byte(&self) -> u8 {
        let mut byte = (self.consumer_num & CONSUMER_NUM_MASK) | ((self.active as u8) * ACTIVE_BIT);
        if byte.count_ones() % 2 != 0 {
            byte |= PARITY_BIT;
        }
        byte
    }

    /// Serialize into the wire format, returning the used buffer length.
    ///
    /// `seeds` are derived from the addressed consumer's CID (any seed works
    /// for the idle block; consumers ignore it).
    pub fn serialize(
        &self,
        layer: Layer,
        seeds: CrcSeeds,
        buffer: &mut [u8],
    ) -> Result<usize, WireFormatError> {
        let size = Self::wire_size(layer);
        if buffer.len() < size {
            return Err(WireFormatError::BufferTooShort);
        }

        let mcast = self.mcast_byte();
        buffer[0] = mcast;
        buffer[1..3].copy_from_slice(&self.correction_ticks.to_le_bytes());
        buffer[3] = !mcast;
        match layer {
            Layer::Base => {
                let crc = crc_s3(seeds.s3, &buffer[..4]);
                buffer[4..6].copy_from_slice(&crc.to_le_bytes());
            }
            Layer::Extended => {
                let crc = crc_s5(seeds.s5, &buffer[..4]);
                buffer[4..7].copy_from_slice(&crc.to_le_bytes()[..3]);
            }
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds() -> CrcSeeds {
        CrcSeeds {
            s1: 0,
            s3: 0xCAFE,
            s5: 0x12_3456,
        }
    }

    #[test]
    fn mcast_byte_has_even_parity() {
        for consumer_num in 0..=15 {
            for active in [false, true] {
                let tcorr = TimeCorrection {
                    consumer_num,
                    active,
                    correction_ticks: 0,
                };
                let byte = tcorr.mcast_byte();
                assert_eq!(byte.count_ones() % 2, 0, "byte 0x{byte:02X}");
                assert_eq!(byte & CONSUMER_NUM_MASK, consumer_num);
                assert_eq!(byte & ACTIVE_BIT != 0, active);
            }
        }
    }

    #[test]
    fn base_layout() {
        let tcorr = TimeCorrection {
            consumer_num: 3,
            active: true,
            correction_ticks: 0x0182,
        };
        let mut buffer = [0u8; TimeCorrection::WIRE_SIZE_EXTENDED];
        let len = tcorr.serialize(Layer::Base, seeds(), &mut buffer).unwrap();
        assert_eq!(len, TimeCorrection::WIRE_SIZE_BASE);

        assert_eq!(buffer[0] & CONSUMER_NUM_MASK, 3);
        assert_eq!(&buffer[1..3], &[0x82, 0x01]);
        assert_eq!(buffer[3], !buffer[0]);
        let crc = crc_s3(0xCAFE, &buffer[..4]);
        assert_eq!(&buffer[4..6], &crc.to_le_bytes());
    }

    #[test]
    fn extended_uses_three_crc_bytes() {
        let tcorr = TimeCorrection::idle();
        let mut buffer = [0u8; TimeCorrection::WIRE_SIZE_EXTENDED];
        let len = tcorr
            .serialize(Layer::Extended, seeds(), &mut buffer)
            .unwrap();
        assert_eq!(len, TimeCorrection::WIRE_SIZE_EXTENDED);
        let crc = crc_s5(0x12_3456, &buffer[..4]);
        assert_eq!(&buffer[4..7], &crc.to_le_bytes()[..3]);
    }

    #[test]
    fn idle_block_addresses_no_consumer() {
        let idle = TimeCorrection::idle();
        assert_eq!(idle.mcast_byte() & CONSUMER_NUM_MASK, 0);
        assert_eq!(idle.mcast_byte() & ACTIVE_BIT, 0);
    }
}
