//! Cipsafe is a library implementing the producing half of a CIP Safety
//! connection, the Safety Validator Client. It provides the connection state
//! machine, the EPI paced frame production, the Time Coordination based
//! consumer liveness checks and the seeded safety CRC wire formats for
//! single-cast and multicast connections in all four message formats.
//!
//! # Device interfaces
//! `cipsafe` is designed to be able to work on many different underlying
//! platforms, including embedded targets. This does mean that it cannot use
//! the standard library or platform specific libraries to access the system
//! clock and the network. That needs to be provided by the user of the
//! library.
//!
//! The crate defines three interfaces for this: [`SafetyClock`] supplies the
//! 128 µs tick system time the protocol runs on, [`SafetyTransport`] carries
//! the produced frames, and [`SafetyApplication`] supplies the produced
//! payload and observes connection events and errors.
//!
//! # How do I use this?
//! Construct a [`SafetyValidator`] over the three interface implementations,
//! mark the stack running, allocate an instance slot and open it with the
//! parameters negotiated during connection establishment. From then on the
//! core is driven from the outside: call
//! [`produce`](SafetyValidator::produce) periodically (at least once per
//! EPI) and feed received Time Coordination messages into
//! [`handle_time_coordination`](SafetyValidator::handle_time_coordination).

#![no_std]

#[cfg(feature = "std")]
extern crate std;

mod application;
mod clock;
pub mod config;
pub mod crc;
pub mod datastructures;
mod error;
pub mod time;
mod transport;
pub mod validator;

pub use application::{DeviceStatus, PayloadUnavailable, RunIdle, SafetyApplication};
pub use clock::SafetyClock;
pub use error::{ErrorKind, Severity, ValidatorError};
pub use transport::{SafetyTransport, SendError};
pub use validator::{SafetyValidator, StackState, ValidatorEvent, ValidatorState};
