use bitflags::bitflags;

use crate::frame::crc::CrcWidth;
use crate::frame::{encode_header, FrameBuffer, FrameOptions, FrameType, HeaderFormat, LR_BROADCAST, MAX_FRAME_LEN};
use crate::noise::NoiseTracker;
use crate::power::{self, Retransmission};
use crate::profile::BEAM_LR_LEN;
use crate::{CommunicationProfile, Error, ProtocolMode, Radio};

/// First byte of every wakeup beam.
pub const BEAM_TAG: u8 = 0x55;

/// Long Range retries that step power up before the margin rule
/// takes over again.
pub const LR_POWER_RETRIES: u8 = 2;

bitflags! {
    /// Bookkeeping for a frame in flight.
    #[repr(transparent)]
    #[derive(Default)]
    pub struct FrameStatus: u8 {
        /// The frame is being sent again.
        const RETRANSMIT = 0x01;
        /// A wakeup beam already went out for this frame.
        const BEAMED = 0x02;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FrameStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameStatus({=u8:x})", self.bits)
    }
}

/// A frame queued for transmission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitFrame {
    pub options: FrameOptions,
    pub payload: FrameBuffer<MAX_FRAME_LEN>,
    /// Power to send at, in dBm. Long Range frames overwrite this
    /// with the adapted power.
    pub tx_power: i8,
    /// Last RSSI the destination reported for us.
    pub rssi: i8,
    pub use_lbt: bool,
    status: FrameStatus,
    lr_retries: u8,
}

impl TransmitFrame {
    pub fn new(options: FrameOptions, payload: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            options,
            payload: FrameBuffer::from_slice(payload).map_err(|_| Error::InvalidParameters)?,
            tx_power: 0,
            rssi: power::RSSI_INVALID,
            use_lbt: true,
            status: FrameStatus::empty(),
            lr_retries: 0,
        })
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    /// Mark the frame as a retransmission. A beam already sent for it
    /// is not sent again.
    pub fn retransmit_start(&mut self) {
        self.status |= FrameStatus::RETRANSMIT;
    }

    pub fn retransmit_stop(&mut self) {
        self.status.remove(FrameStatus::RETRANSMIT);
        self.lr_retries = 0;
    }

    pub fn is_retransmit_enabled(&self) -> bool {
        self.status.contains(FrameStatus::RETRANSMIT)
    }
}

/// Build the beam that wakes the destination of `options`.
fn beam_bytes(
    format: HeaderFormat,
    options: &FrameOptions,
    tx_power: i8,
    hash: u8,
) -> Result<FrameBuffer<BEAM_LR_LEN>, Error> {
    let dest = options.destination;
    match format {
        HeaderFormat::LongRange => FrameBuffer::from_slice(&[
            BEAM_TAG,
            (power::tx_power_index(tx_power) << 4) | ((dest >> 8) as u8 & 0x0f),
            dest as u8,
            hash,
        ]),
        // older 3-channel receivers only read the node id, so the
        // hash byte repeats the tag
        HeaderFormat::ThreeChannel => FrameBuffer::from_slice(&[BEAM_TAG, dest as u8, BEAM_TAG]),
        HeaderFormat::TwoChannel => FrameBuffer::from_slice(&[BEAM_TAG, dest as u8, hash]),
    }
}

/// Sends frames and wakeup beams through the radio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transmitter {
    beam_time: u16,
}

impl Transmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration, in milliseconds, of the last beam sent.
    pub fn beam_time(&self) -> u16 {
        self.beam_time
    }

    /// How long the last wakeup beam fragment kept the air busy.
    pub fn wakeup_beam_fragment_time<R: Radio>(&self, radio: &R) -> u16 {
        self.beam_time.saturating_add(radio.beam_startup_time())
    }

    /// Send `frame` using `profile`.
    ///
    /// Beam profiles send the beam first, then the frame on the
    /// matching data profile, unless the frame is a retransmission
    /// that already beamed.
    pub fn transmit<R: Radio>(
        &mut self,
        radio: &mut R,
        noise: &NoiseTracker,
        profile: CommunicationProfile,
        frame: &mut TransmitFrame,
    ) -> Result<(), Error> {
        let format = profile.header_format().ok_or(Error::Unsupported)?;
        let mode = radio.protocol_mode().ok_or(Error::Unsupported)?;
        if !mode.accepts(format) {
            log::debug!("profile {} not usable in mode {:?}", profile, mode);
            return Err(Error::Unsupported);
        }

        let data_profile = profile.data_profile();
        let params = data_profile.resolve()?;
        let beaming = profile.is_beam() && !frame.status.contains(FrameStatus::RETRANSMIT | FrameStatus::BEAMED);

        if format == HeaderFormat::LongRange {
            Self::update_lr_power(radio, noise, profile, frame, beaming);
        }

        if beaming {
            let beam_params = profile.resolve()?;
            let hash = radio.home_id_hash(frame.options.home_id_word(), frame.options.destination, mode);
            let beam = beam_bytes(format, &frame.options, frame.tx_power, hash)?;
            log::trace!("beam {:02x?} on channel {}", beam.as_slice(), beam_params.channel);
            radio.transmit_beam(&beam_params, &beam, frame.tx_power)?;
            frame.status |= FrameStatus::BEAMED;
            self.beam_time = profile.beam_duration().unwrap_or(0) as u16;
        }

        let header = encode_header(&frame.options, format, frame.payload.len(), params.crc)?;
        radio.transmit(&params, &header, &frame.payload, frame.use_lbt, frame.tx_power)?;
        Ok(())
    }

    fn update_lr_power<R: Radio>(
        radio: &R,
        noise: &NoiseTracker,
        profile: CommunicationProfile,
        frame: &mut TransmitFrame,
        beaming: bool,
    ) {
        let lr_config = radio.lr_channel_config();
        let noise_floor = noise.lr_noise_floor(profile, lr_config);
        let (min, max) = (radio.min_lr_tx_power(), radio.max_lr_tx_power());
        let options = &mut frame.options;
        options.noise_floor = noise_floor;

        let tx_power = if options.frame_type == FrameType::Ack {
            power::adjust(frame.tx_power, options.receive_rssi, noise_floor, Retransmission::None, min, max)
        } else if options.destination == LR_BROADCAST {
            max
        } else if frame.status.contains(FrameStatus::RETRANSMIT) {
            let retransmit = if beaming {
                Retransmission::Beamed
            } else if frame.lr_retries < LR_POWER_RETRIES {
                frame.lr_retries += 1;
                Retransmission::Retry
            } else {
                Retransmission::None
            };
            power::adjust(frame.tx_power, frame.rssi, noise_floor, retransmit, min, max)
        } else {
            power::adjust(frame.tx_power, frame.rssi, noise_floor, Retransmission::None, min, max)
        };

        options.tx_power = tx_power;
        frame.tx_power = tx_power;
    }
}

/// Whether `profile` may be used in `mode` at all.
pub fn profile_allowed(profile: CommunicationProfile, mode: ProtocolMode) -> bool {
    profile
        .header_format()
        .map_or(false, |format| mode.accepts(format))
}

/// Checksum carried by frames received on `profile`, or `None` if
/// nothing can be received on it.
pub fn receive_crc(profile: CommunicationProfile) -> Option<CrcWidth> {
    profile.data_profile().resolve().ok().map(|params| params.crc)
}
