use core::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Fewer than the ten octets of an empty frame.
    TooShort,
    /// First two octets are not `24 3C`.
    BadHeader,
    /// Fewer octets than the declared length requires.
    Truncated,
    CrcMismatch { received: u16, computed: u16 },
    /// Data section shorter than its fixed prefix.
    Malformed,
    /// Payload does not fit the one-octet length field.
    Oversized,
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::TooShort => write!(f, "frame too short"),
            FrameError::BadHeader => write!(f, "bad frame header"),
            FrameError::Truncated => write!(f, "frame truncated"),
            FrameError::CrcMismatch { received, computed } => write!(
                f,
                "CRC mismatch: got {:#06x}, expected {:#06x}",
                received, computed
            ),
            FrameError::Malformed => write!(f, "malformed data section"),
            FrameError::Oversized => write!(f, "payload too large"),
        }
    }
}
