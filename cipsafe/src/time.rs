//! Time types for the safety connection core.
//!
//! All producer timing runs on a 32 bit system time counting 128 µs ticks,
//! monotonic modulo 2^32. Safety frames carry only the low 16 bits of that
//! counter as their time stamp. Both widths wrap in normal operation, so every
//! comparison in this module is modular; none of the arithmetic may be widened
//! to a larger integer type without changing behaviour at the wrap boundary.

/// Duration of one system time tick in microseconds.
pub const TICK_US: u32 = 128;

/// 32 bit system time in 128 µs ticks, monotonic modulo 2^32.
///
/// Obtained from the [`SafetyClock`](crate::SafetyClock) collaborator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SystemTime(u32);

impl SystemTime {
    /// Construct a system time from a raw tick count.
    ///
    /// # Example
    /// ```
    /// # use cipsafe::time::SystemTime;
    /// assert_eq!(SystemTime::from_ticks(250).ticks(), 250);
    /// ```
    pub const fn from_ticks(ticks: u32) -> Self {
        Self(ticks)
    }

    /// The raw tick count.
    pub const fn ticks(self) -> u32 {
        self.0
    }

    /// This time advanced by `ticks`, modulo 2^32.
    pub const fn wrapping_add_ticks(self, ticks: u32) -> Self {
        Self(self.0.wrapping_add(ticks))
    }

    /// Modular "greater or equal" comparison.
    ///
    /// `self` is considered to be at or after `other` when the modular
    /// distance from `other` to `self` is less than half the counter range.
    /// This is the mechanism that tolerates 32 bit system time rollover.
    ///
    /// # Example
    /// ```
    /// # use cipsafe::time::SystemTime;
    /// let before_wrap = SystemTime::from_ticks(0xFFFF_FFF0);
    /// let after_wrap = SystemTime::from_ticks(0x0000_0010);
    /// assert!(after_wrap.is_at_or_after(before_wrap));
    /// assert!(!before_wrap.is_at_or_after(after_wrap));
    /// ```
    pub const fn is_at_or_after(self, other: SystemTime) -> bool {
        self.0.wrapping_sub(other.0) < 0x8000_0000
    }

    /// The low 16 bits of this time, i.e. the safety time stamp form.
    pub const fn timestamp(self) -> Timestamp {
        Timestamp(self.0 as u16)
    }

    /// The high 16 bits of this time.
    pub(crate) const fn high_word(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

/// 16 bit safety time stamp as carried in produced data messages.
///
/// Wraps roughly every 8.4 s at the 128 µs tick rate; the producer tracks the
/// wrap count separately (`TS_Rollover_Count`) for Extended format CRC
/// seeding.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timestamp(u16);

impl Timestamp {
    /// The zero time stamp, sent while a connection is still idle.
    pub const ZERO: Self = Self(0);

    /// Construct a time stamp from its raw 16 bit value.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw 16 bit value.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// This time stamp advanced by `ticks`, modulo 2^16.
    pub const fn wrapping_add(self, ticks: u16) -> Self {
        Self(self.0.wrapping_add(ticks))
    }

    /// Whether producing `self` directly after `previous` crossed the
    /// 0xFFFF → 0x0000 boundary.
    ///
    /// Production time stamps advance by less than half the counter range per
    /// frame, so a plain numeric decrease is exactly one wrap.
    pub const fn rolled_over_from(self, previous: Timestamp) -> bool {
        self.0 < previous.0
    }

    /// Little endian wire bytes.
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_modular_comparison() {
        let t = SystemTime::from_ticks(1000);
        assert!(t.is_at_or_after(t));
        assert!(t.is_at_or_after(SystemTime::from_ticks(999)));
        assert!(!t.is_at_or_after(SystemTime::from_ticks(1001)));

        // across the 32 bit wrap
        let late = SystemTime::from_ticks(0xFFFF_FFFE);
        let wrapped = late.wrapping_add_ticks(10);
        assert_eq!(wrapped.ticks(), 8);
        assert!(wrapped.is_at_or_after(late));
        assert!(!late.is_at_or_after(wrapped));
    }

    #[test]
    fn timestamp_is_low_word_of_system_time() {
        let t = SystemTime::from_ticks(0x1234_5678);
        assert_eq!(t.timestamp().raw(), 0x5678);
        assert_eq!(t.high_word(), 0x1234);
    }

    #[test]
    fn rollover_detection() {
        let prev = Timestamp::from_raw(0xFFF0);
        let next = prev.wrapping_add(0x20);
        assert_eq!(next.raw(), 0x0010);
        assert!(next.rolled_over_from(prev));
        assert!(!prev.rolled_over_from(Timestamp::from_raw(0xFFE0)));
    }
}
