//! Definition of the application collaborator interface.

use crate::{error::ValidatorError, validator::ValidatorEvent};

/// Run/Idle flag of a produced frame, carried in the Mode Byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RunIdle {
    Run,
    Idle,
}

/// Overall device state as reported by the device's identity/status logic.
///
/// Anything other than [`Executing`](DeviceStatus::Executing) forces produced
/// frames to Idle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    SelfTesting,
    Idle,
    Executing,
    Aborted,
}

/// Error returned by [`SafetyApplication::output_data`] when no payload is
/// available; production of that tick's frame is skipped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PayloadUnavailable;

/// Application side collaborator of the safety validator core.
///
/// The core reads its produced payload through this trait and reports every
/// state machine event and every error to it, before any internal handling
/// runs.
pub trait SafetyApplication {
    /// Read the current payload for a producing connection point into `buf`.
    ///
    /// Returns the number of payload bytes written (which must match the
    /// connection's configured size) and the application's Run/Idle flag.
    fn output_data(
        &mut self,
        connection_point: u16,
        buf: &mut [u8],
    ) -> Result<(usize, RunIdle), PayloadUnavailable>;

    /// Current overall device state.
    fn device_status(&self) -> DeviceStatus;

    /// Observe a state machine event of a validator instance.
    ///
    /// Called for every event, including ones that do not cause a state
    /// transition, before the state logic runs.
    fn validator_event(&mut self, instance_id: u16, event: ValidatorEvent);

    /// Observe an error, fail-safe or recoverable.
    fn error(&mut self, error: &ValidatorError);
}
