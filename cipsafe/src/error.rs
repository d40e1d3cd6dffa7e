//! Error reporting for the safety validator core.
//!
//! Errors fall into two classes. *Fail-safe* errors are internal consistency
//! violations (invalid state, invalid index, out of range configuration);
//! they indicate a defect in the stack or its caller and the higher level
//! safety supervisor is expected to drive the device into a safe state.
//! *Recoverable* errors are expected runtime conditions caused by the network
//! or environment (a missed Time Coordination reply, a transport send
//! failure); handling is to fault the affected consumer or connection and
//! carry on.
//!
//! Every error produced by the core flows through a single reporting point
//! ([`SafetyValidator`](crate::SafetyValidator)) which records it as the
//! instance's last error and forwards it to the application error sink. There
//! is no panic path; all errors are returned as values.

use core::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The two error classes of the safety stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Internal consistency violation; non-recoverable for the affected
    /// instance.
    FailSafe,
    /// Expected runtime condition; fault the consumer or connection and
    /// continue.
    Recoverable,
}

/// Stable numeric error codes, exposed for diagnostics.
///
/// Fail-safe codes live in the 0x01xx namespace, recoverable codes in 0x02xx,
/// so the caller's safety logic can distinguish the classes numerically as
/// well as through [`ErrorKind::severity`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum ErrorKind {
    /// An entry point was called while the stack is not in the running state.
    StackNotRunning = 0x0101,
    /// A safety validator instance id outside the valid range, or one that
    /// does not resolve to an allocated client.
    InstanceIdInvalid = 0x0102,
    /// An array index outside the capacity of the targeted instance arena.
    IndexOutOfRange = 0x0103,
    /// A state machine event that is not valid in the current state.
    InvalidEvent = 0x0104,
    /// EPI outside the allowed [100 µs, 1 s] range.
    EpiOutOfRange = 0x0105,
    /// Produced payload size outside the bounds of the selected format.
    PayloadSizeInvalid = 0x0106,
    /// Ping interval EPI multiplier too small to run the liveness check, or
    /// too small to sweep every consumer within one ping interval.
    PingMultiplierOutOfRange = 0x0107,
    /// Consumer number outside [1, Max_Consumer_Number].
    ConsumerNumOutOfRange = 0x0108,
    /// Time drift per ping interval outside the allowed [1, 313] tick range.
    TimeDriftOutOfRange = 0x0109,
    /// Round robin consumer index pointer set beyond Max_Consumer_Number.
    RrIndexOutOfRange = 0x010A,
    /// Extended format open without the negotiated initial time stamp and
    /// rollover value.
    InitialTimeMissing = 0x010B,
    /// Consumer count outside the bounds of the selected cast mode.
    ConsumerCountInvalid = 0x010C,

    /// No Time Coordination reply within Timeout_Multiplier.PI + 2 ping
    /// intervals.
    TcooTimeout = 0x0201,
    /// The transport collaborator failed to send a produced frame; the frame
    /// is dropped.
    TransportSendFailure = 0x0202,
    /// The application payload source had no data for this tick; production
    /// is skipped.
    OutputDataUnavailable = 0x0203,
    /// A multicast consumer tried to rejoin a slot that is still quarantined.
    ConsumerQuarantined = 0x0204,
    /// A multicast join aimed at a live consumer slot with connection
    /// parameters differing from the established ones.
    ReconnectMismatch = 0x0205,
}

impl ErrorKind {
    /// The error class this code belongs to.
    pub fn severity(self) -> Severity {
        if u16::from(self) & 0xFF00 == 0x0100 {
            Severity::FailSafe
        } else {
            Severity::Recoverable
        }
    }
}

/// An error reported by the safety validator core.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ValidatorError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// The safety validator instance the error belongs to, or 0 when the
    /// error is not tied to an instance.
    pub instance_id: u16,
    /// Additional context, e.g. the offending consumer number or event code.
    pub add_info: u32,
}

impl ValidatorError {
    pub(crate) fn new(kind: ErrorKind, instance_id: u16, add_info: u32) -> Self {
        Self {
            kind,
            instance_id,
            add_info,
        }
    }

    /// The error class, see [`Severity`].
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl Display for ValidatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let class = match self.severity() {
            Severity::FailSafe => "fail-safe",
            Severity::Recoverable => "recoverable",
        };
        write!(
            f,
            "{} error {:?} (0x{:04X}) on instance {} (info 0x{:08X})",
            class,
            self.kind,
            u16::from(self.kind),
            self.instance_id,
            self.add_info
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValidatorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_code_namespace() {
        assert_eq!(ErrorKind::InvalidEvent.severity(), Severity::FailSafe);
        assert_eq!(ErrorKind::RrIndexOutOfRange.severity(), Severity::FailSafe);
        assert_eq!(ErrorKind::TcooTimeout.severity(), Severity::Recoverable);
        assert_eq!(
            ErrorKind::TransportSendFailure.severity(),
            Severity::Recoverable
        );
    }

    #[test]
    fn codes_round_trip_through_u16() {
        for kind in [
            ErrorKind::StackNotRunning,
            ErrorKind::InvalidEvent,
            ErrorKind::TcooTimeout,
            ErrorKind::ConsumerQuarantined,
            ErrorKind::ReconnectMismatch,
        ] {
            let code: u16 = kind.into();
            assert_eq!(ErrorKind::try_from(code), Ok(kind));
        }
    }
}
