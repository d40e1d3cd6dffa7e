//! Definition of the abstract safety transport.

/// Error returned by [`SafetyTransport::send`].
///
/// A send failure drops the frame; it never implicitly advances connection
/// state. The core reports it as a recoverable error and produces again on
/// the next EPI.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SendError;

/// Transport used to emit produced safety frames and connection close
/// notifications.
///
/// Implemented by the platform glue over whatever queueing layer carries the
/// safety I/O messages. All calls are synchronous and non-blocking from the
/// core's perspective.
pub trait SafetyTransport {
    /// Hand a fully serialized safety frame to the transport.
    fn send(&mut self, instance_id: u16, frame: &[u8]) -> Result<(), SendError>;

    /// Close the underlying connection of one consumer of the instance.
    ///
    /// `consumer_num == 0` closes the connections of all consumers. Close is
    /// fire and forget; transport level errors are the transport's to report.
    fn close_connection(&mut self, instance_id: u16, consumer_num: u8);
}
