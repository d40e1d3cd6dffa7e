//! Connection state machine of a Safety Validator Client instance.

use core::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Lifecycle state of a client instance.
///
/// Unallocated instances rest in [`Idle`](ValidatorState::Idle); every other
/// state is reached exclusively through [`transition`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ValidatorState {
    #[default]
    Idle = 0,
    Initializing = 1,
    Established = 2,
    Failed = 3,
}

impl Display for ValidatorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ValidatorState::Idle => write!(f, "Idle"),
            ValidatorState::Initializing => write!(f, "Initializing"),
            ValidatorState::Established => write!(f, "Established"),
            ValidatorState::Failed => write!(f, "Failed"),
        }
    }
}

/// Events driving the client state machine.
///
/// Every event is forwarded to the application event sink before the state
/// logic runs, whether or not it causes a transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ValidatorEvent {
    ClientOpen = 1,
    ClientClose = 2,
    FirstHandshakeComplete = 3,
    ConsumerJoin = 4,
    ConsumerLeave = 5,
    ConsumerFaulted = 6,
    AllConsumersFaulted = 7,
    ConsumerActive = 8,
}

/// Marker for an event that is not valid in the current state; reported as a
/// fail-safe error by the caller, with the state left unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct InvalidTransition;

/// The transition table.
///
/// `Ok(Some(next))` is a transition, `Ok(None)` a notify-only event and
/// `Err(_)` an invalid event for this state.
pub(crate) fn transition(
    state: ValidatorState,
    event: ValidatorEvent,
) -> Result<Option<ValidatorState>, InvalidTransition> {
    use ValidatorEvent::*;
    use ValidatorState::*;

    match (state, event) {
        (Idle, ClientOpen) => Ok(Some(Initializing)),

        (Initializing, FirstHandshakeComplete) => Ok(Some(Established)),
        (Initializing, AllConsumersFaulted) => Ok(Some(Failed)),
        (Initializing, ClientClose) => Ok(Some(Idle)),
        (Initializing, ConsumerJoin | ConsumerLeave | ConsumerFaulted) => Ok(None),

        (Established, AllConsumersFaulted) => Ok(Some(Failed)),
        (Established, ClientClose) => Ok(Some(Idle)),
        (Established, ConsumerActive | ConsumerJoin | ConsumerLeave | ConsumerFaulted) => Ok(None),

        (Failed, ClientOpen) => Ok(Some(Initializing)),
        (Failed, ClientClose) => Ok(Some(Idle)),
        (Failed, ConsumerJoin) => Ok(Some(Initializing)),
        (Failed, ConsumerLeave) => Ok(None),

        _ => Err(InvalidTransition),
    }
}
