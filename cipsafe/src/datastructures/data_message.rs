//! Produced safety data messages.
//!
//! A data message is two sections. The data section carries the payload, the
//! Mode Byte and a CRC over both; Long formats repeat the payload bitwise
//! complemented under its own CRC. The time stamp section carries the 16 bit
//! production time stamp and a CRC that also covers the Mode Byte. Which CRC
//! protects which section depends on the format:
//!
//! | format        | data section          | time stamp section |
//! |---------------|-----------------------|--------------------|
//! | Base Short    | CRC-S1                | CRC-S1             |
//! | Base Long     | CRC-S3 + complement/CRC-S3 | CRC-S1        |
//! | Extended Short| CRC-S5 (3 bytes)      | CRC-S5 (3 bytes)   |
//! | Extended Long | CRC-S3 + complement/CRC-S5 | CRC-S5 (3 bytes) |
//!
//! All CRCs start from the connection's PID derived seed; Extended format
//! callers pass seeds already reseeded with the current time stamp rollover
//! count. Multi byte fields are little endian.

use super::{ModeByte, TimeCorrection, WireFormatError};
use crate::{
    config::{Layer, Length, MessageFormat},
    crc::{crc_s1, crc_s3, crc_s5, CrcSeeds},
    time::Timestamp,
};

/// Largest payload of a Short format message.
pub const MAX_SHORT_PAYLOAD: usize = 2;
/// Largest payload of a Long format message.
pub const MAX_LONG_PAYLOAD: usize = 250;

/// Maximum wire length of a produced frame.
///
/// Worst case is an Extended Long data message at full payload with the
/// multicast Time Correction section appended. This can be used to
/// preallocate buffers that always fit frames produced by `cipsafe`.
pub const MAX_FRAME_LEN: usize =
    2 * MAX_LONG_PAYLOAD + 11 + TimeCorrection::WIRE_SIZE_EXTENDED;

/// A data message ready for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataMessage<'a> {
    pub mode_byte: ModeByte,
    pub payload: &'a [u8],
    pub timestamp: Timestamp,
}

impl<'a> DataMessage<'a> {
    /// Whether `payload_len` is legal for the format's length class.
    pub fn payload_len_valid(format: MessageFormat, payload_len: usize) -> bool {
        match format.length {
            Length::Short => (1..=MAX_SHORT_PAYLOAD).contains(&payload_len),
            Length::Long => (3..=MAX_LONG_PAYLOAD).contains(&payload_len),
        }
    }

    /// The byte size on the wire for the given format and payload length.
    pub fn wire_size(format: MessageFormat, payload_len: usize) -> usize {
        match (format.layer, format.length) {
            // payload + mode + S1 + ts + S1
            (Layer::Base, Length::Short) => payload_len + 5,
            // payload + mode + S3 + complement + S3 + ts + S1
            (Layer::Base, Length::Long) => 2 * payload_len + 8,
            // payload + mode + S5 + ts + S5
            (Layer::Extended, Length::Short) => payload_len + 9,
            // payload + mode + S3 + complement + S5 + ts + S5
            (Layer::Extended, Length::Long) => 2 * payload_len + 11,
        }
    }

    /// Serialize into the wire format, returning the used buffer length.
    ///
    /// `seeds` are the connection's current CRC seeds; for Extended format
    /// these must already include the rollover count.
    pub fn serialize(
        &self,
        format: MessageFormat,
        seeds: CrcSeeds,
        buffer: &mut [u8],
    ) -> Result<usize, WireFormatError> {
        if !Self::payload_len_valid(format, self.payload.len()) {
            return Err(WireFormatError::PayloadSize);
        }
        let size = Self::wire_size(format, self.payload.len());
        if buffer.len() < size {
            return Err(WireFormatError::BufferTooShort);
        }

        let len = self.payload.len();
        let mode = self.mode_byte.raw();

        buffer[..len].copy_from_slice(self.payload);
        buffer[len] = mode;
        let mut at = len + 1;

        // data section CRC over mode byte then payload
        match (format.layer, format.length) {
            (Layer::Base, Length::Short) => {
                buffer[at] = crc_s1(crc_s1(seeds.s1, &[mode]), self.payload);
                at += 1;
            }
            (Layer::Extended, Length::Short) => {
                let crc = crc_s5(crc_s5(seeds.s5, &[mode]), self.payload);
                buffer[at..at + 3].copy_from_slice(&crc.to_le_bytes()[..3]);
                at += 3;
            }
            (_, Length::Long) => {
                let crc = crc_s3(crc_s3(seeds.s3, &[mode]), self.payload);
                buffer[at..at + 2].copy_from_slice(&crc.to_le_bytes());
                at += 2;

                // complemented payload under its own CRC
                for (dst, &src) in buffer[at..at + len].iter_mut().zip(self.payload) {
                    *dst = !src;
                }
                let complement_range = at..at + len;
                at += len;
                match format.layer {
                    Layer::Base => {
                        let mut crc = crc_s3(seeds.s3, &[mode]);
                        crc = crc_s3(crc, &buffer[complement_range]);
                        buffer[at..at + 2].copy_from_slice(&crc.to_le_bytes());
                        at += 2;
                    }
                    Layer::Extended => {
                        let mut crc = crc_s5(seeds.s5, &[mode]);
                        crc = crc_s5(crc, &buffer[complement_range]);
                        buffer[at..at + 3].copy_from_slice(&crc.to_le_bytes()[..3]);
                        at += 3;
                    }
                }
            }
        }

        // time stamp section: time stamp under a CRC that also covers the
        // mode byte
        let ts = self.timestamp.to_le_bytes();
        buffer[at..at + 2].copy_from_slice(&ts);
        at += 2;
        match format.layer {
            Layer::Base => {
                buffer[at] = crc_s1(seeds.s1, &[mode, ts[0], ts[1]]);
                at += 1;
            }
            Layer::Extended => {
                let crc = crc_s5(seeds.s5, &[mode, ts[0], ts[1]]);
                buffer[at..at + 3].copy_from_slice(&crc.to_le_bytes()[..3]);
                at += 3;
            }
        }

        debug_assert_eq!(at, size);
        Ok(size)
    }
}
