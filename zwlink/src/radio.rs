//! The radio driver this link layer sits on.

use crate::frame::HeaderFormat;
use crate::{Error, LrChannelConfig, ProtocolMode, TransmitParameters};

/// Why the radio refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    InvalidArgument,
    BufferFull,
    Busy,
    Other,
}

impl core::fmt::Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument to radio"),
            Self::BufferFull => write!(f, "radio transmit buffer full"),
            Self::Busy => write!(f, "radio busy"),
            Self::Other => write!(f, "radio failure"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RadioError {}

impl From<RadioError> for Error {
    fn from(err: RadioError) -> Self {
        match err {
            RadioError::InvalidArgument => Error::InvalidParameters,
            RadioError::BufferFull => Error::NoMemory,
            RadioError::Busy => Error::Busy,
            RadioError::Other => Error::UnknownError,
        }
    }
}

/// What the radio knows about a frame it just received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxParameters {
    /// Receive channel id, an index into the active profile table.
    pub channel: u8,
    pub header_format: HeaderFormat,
    pub rssi: i8,
}

/// A radio able to carry link layer frames.
pub trait Radio {
    /// Send one frame. The radio appends the checksum named in `params`.
    fn transmit(
        &mut self,
        params: &TransmitParameters,
        header: &[u8],
        payload: &[u8],
        use_lbt: bool,
        tx_power: i8,
    ) -> Result<(), RadioError>;

    /// Send a wakeup beam, repeated as `params` says.
    fn transmit_beam(
        &mut self,
        params: &TransmitParameters,
        beam: &[u8],
        tx_power: i8,
    ) -> Result<(), RadioError>;

    /// Instantaneous background RSSI on a channel, if it can be measured.
    fn background_rssi(&mut self, channel: u8) -> Option<i8>;

    /// The region's channel layout, or `None` if no region is set.
    fn protocol_mode(&self) -> Option<ProtocolMode>;

    fn lr_channel_config(&self) -> LrChannelConfig;

    fn change_lr_channel_config(&mut self, config: LrChannelConfig) -> Result<(), RadioError>;

    fn min_lr_tx_power(&self) -> i8;

    fn max_lr_tx_power(&self) -> i8;

    /// Hash of the home id carried in wakeup beams.
    fn home_id_hash(&self, home_id: u32, node_id: u16, mode: ProtocolMode) -> u8;

    /// Program the receive address filter.
    fn set_network_ids(&mut self, home_id: [u8; 4], node_id: u16, hash: u8);

    /// Milliseconds the radio needs before a beam fragment starts.
    fn beam_startup_time(&self) -> u16 {
        0
    }
}
