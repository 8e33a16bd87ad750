/// Errors returned synchronously by the link-layer API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A required argument was missing or inconsistent.
    InvalidParameters,
    /// The profile or operation is not valid for the radio configuration.
    Unsupported,
    /// A bounded table or queue is full.
    NoMemory,
    /// The radio is busy.
    Busy,
    /// The radio failed in some other way.
    UnknownError,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::InvalidParameters => write!(f, "invalid parameters"),
            Self::Unsupported => write!(f, "unsupported operation"),
            Self::NoMemory => write!(f, "no memory available"),
            Self::Busy => write!(f, "radio busy"),
            Self::UnknownError => write!(f, "unknown radio error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Reasons a received frame could not be decoded.
///
/// These never reach upper layers; the frame is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Too short, or a length field points outside the frame.
    MalformedFrame,
    /// The trailing CRC does not match the frame contents.
    ChecksumMismatch,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::MalformedFrame => write!(f, "malformed frame"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}
