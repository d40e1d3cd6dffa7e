//! Safety CRC kernels and seed derivation.
//!
//! CIP Safety protects each frame section with one of three CRCs, chosen by
//! message format:
//!
//! * **CRC-S1**: 8 bit, polynomial 0x39, used for Short Base sections and
//!   the Base time stamp section.
//! * **CRC-S3**: 16 bit, polynomial 0x080F, used for Long data sections
//!   (actual and complement) and the Base Time Correction section.
//! * **CRC-S5**: 24 bit, polynomial 0x5D6DCB, used for Extended format
//!   sections and carried as three wire bytes.
//!
//! None of these start from a fixed init value. Each connection seeds its
//! CRCs with a value derived from the Producer or Consumer Identifier (PID /
//! CID), and the Extended format additionally folds the current time stamp
//! rollover count into the seed so stale frames from a previous epoch never
//! verify.

/// Identifier of one end of a safety connection, the PID/CID input of the
/// CRC seed calculation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    /// ODVA vendor id of the device.
    pub vendor_id: u16,
    /// Serial number of the device.
    pub device_serial: u32,
    /// Serial number of this individual connection.
    pub connection_serial: u16,
}

impl ConnectionId {
    fn to_bytes(self) -> [u8; 8] {
        let mut bytes = [0; 8];
        bytes[0..2].copy_from_slice(&self.vendor_id.to_le_bytes());
        bytes[2..6].copy_from_slice(&self.device_serial.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.connection_serial.to_le_bytes());
        bytes
    }
}

/// CRC-S1 over `data`, starting from `seed`.
pub fn crc_s1(seed: u8, data: &[u8]) -> u8 {
    const POLY: u8 = 0x39;
    let mut crc = seed;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// CRC-S3 over `data`, starting from `seed`.
pub fn crc_s3(seed: u16, data: &[u8]) -> u16 {
    const POLY: u16 = 0x080F;
    let mut crc = seed;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// CRC-S5 over `data`, starting from `seed`. Only the low 24 bits are
/// significant; the result is already masked.
pub fn crc_s5(seed: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0x5D_6DCB;
    let mut crc = seed & 0x00FF_FFFF;
    for &byte in data {
        crc ^= (byte as u32) << 16;
        for _ in 0..8 {
            if crc & 0x0080_0000 != 0 {
                crc = ((crc << 1) ^ POLY) & 0x00FF_FFFF;
            } else {
                crc = (crc << 1) & 0x00FF_FFFF;
            }
        }
    }
    crc
}

/// Per-connection CRC seeds in all three widths.
///
/// The base variant is derived once from the PID (or CID for the Time
/// Correction section). For Extended format connections the S3 and S5 seeds
/// are re-derived whenever the time stamp rollover count changes, see
/// [`CrcSeeds::with_rollover`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CrcSeeds {
    pub s1: u8,
    pub s3: u16,
    pub s5: u32,
}

impl CrcSeeds {
    /// Derive the base seeds from a connection identifier.
    pub fn from_id(id: ConnectionId) -> Self {
        let bytes = id.to_bytes();
        Self {
            s1: crc_s1(0, &bytes),
            s3: crc_s3(0, &bytes),
            s5: crc_s5(0, &bytes),
        }
    }

    /// The Extended format seeds for a given time stamp rollover count.
    ///
    /// The rollover count is folded into the S3 and S5 seeds on top of the
    /// PID derivation; CRC-S1 sections do not exist in the Extended format so
    /// the S1 seed is carried unchanged.
    pub fn with_rollover(self, rollover_count: u16) -> Self {
        let bytes = rollover_count.to_le_bytes();
        Self {
            s1: self.s1,
            s3: crc_s3(self.s3, &bytes),
            s5: crc_s5(self.s5, &bytes),
        }
    }
}
