//! Safety I/O wire formats.
//!
//! Only the producing direction is implemented here: data messages in the
//! four format combinations (Base/Extended × Short/Long) and the Time
//! Correction sub-message appended to multicast frames. Frames are built
//! directly into a caller provided buffer and the used length is returned.

pub use data_message::{DataMessage, MAX_FRAME_LEN, MAX_LONG_PAYLOAD, MAX_SHORT_PAYLOAD};
pub use mode_byte::ModeByte;
pub use time_correction::TimeCorrection;

mod data_message;
mod mode_byte;
mod time_correction;

/// Error serializing a frame section.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireFormatError {
    /// The target buffer cannot hold the frame.
    BufferTooShort,
    /// The payload length is outside the bounds of the selected format.
    PayloadSize,
}

impl core::fmt::Display for WireFormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WireFormatError::BufferTooShort => write!(f, "buffer too short"),
            WireFormatError::PayloadSize => write!(f, "payload size out of bounds"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WireFormatError {}
