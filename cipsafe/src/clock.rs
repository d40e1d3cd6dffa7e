//! Definition of the abstract system time source.

use crate::time::SystemTime;

/// System time source for the safety stack.
///
/// `cipsafe` is designed to work on many different underlying platforms,
/// including embedded targets, so it never reads a clock itself. The user
/// provides one through this trait.
pub trait SafetyClock {
    /// Get the current system time as a 32 bit 128 µs tick counter.
    ///
    /// Must be monotonic modulo 2^32; the core relies on modular distance
    /// comparisons and tolerates the counter wrapping.
    fn now(&self) -> SystemTime;
}
