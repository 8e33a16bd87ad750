//! On-air frame headers for the 2-channel, 3-channel and Long Range
//! formats.

use bitfield_struct::bitfield;

pub mod crc;

pub mod explore;
pub use explore::ExploreHeader;

pub mod parse;
pub use parse::{decode, decode_header, DecodedFrame};

pub mod serialize;
pub use serialize::{encode_frame, encode_header, FrameBuffer, Header};

/// Length of a home id.
pub const HOME_ID_LEN: usize = 4;

/// Largest frame any format carries on air, CRC included.
pub const MAX_FRAME_LEN: usize = 170;

/// Room for the largest basic header plus an extended header.
pub const MAX_HEADER_LEN: usize = 24;

/// Every format keeps the frame length at this offset.
pub const LENGTH_INDEX: usize = 7;

/// Long Range node id that addresses every node.
pub const LR_BROADCAST: u16 = 0xfff;

/// Classic node id that addresses every node.
pub const NODE_BROADCAST: u16 = 0xff;

/// Header layout in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderFormat {
    TwoChannel,
    ThreeChannel,
    LongRange,
}

impl HeaderFormat {
    /// Basic header length for a frame type, without routing or
    /// extended headers. None if the format cannot carry the type.
    pub fn header_len(&self, frame_type: FrameType) -> Option<usize> {
        use FrameType::*;
        match (self, frame_type) {
            (Self::TwoChannel, Multicast) => Some(8),
            (Self::TwoChannel, _) => Some(9),
            (Self::ThreeChannel, Multicast) => Some(9),
            (Self::ThreeChannel, _) => Some(10),
            (Self::LongRange, Singlecast) => Some(12),
            (Self::LongRange, Ack) => Some(13),
            (Self::LongRange, _) => None,
        }
    }

    /// Whether node ids are 12 bits wide.
    pub fn wide_node_ids(&self) -> bool {
        matches!(self, Self::LongRange)
    }
}

/// The five on-air frame categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FrameType {
    Singlecast = 1,
    Multicast = 2,
    Ack = 3,
    Explore = 5,
    Routed = 8,
}

impl FrameType {
    pub const ALL: [FrameType; 5] = [
        Self::Singlecast,
        Self::Multicast,
        Self::Ack,
        Self::Explore,
        Self::Routed,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Singlecast),
            2 => Some(Self::Multicast),
            3 => Some(Self::Ack),
            5 => Some(Self::Explore),
            8 => Some(Self::Routed),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Position in per-type tables.
    pub fn index(&self) -> usize {
        match self {
            Self::Singlecast => 0,
            Self::Routed => 1,
            Self::Explore => 2,
            Self::Multicast => 3,
            Self::Ack => 4,
        }
    }
}

/// Extended header carried after the basic (and routing) header.
///
/// The first byte's upper bits hold the extension kind, and the
/// lower three bits a length whose meaning depends on the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeaderExtension {
    kind: u8,
    body: [u8; Self::MAX_BODY],
    len: u8,
}

impl HeaderExtension {
    /// Long Range allows seven body bytes. 3-channel counts the info
    /// byte inside its 3-bit length, so only six fit there.
    pub const MAX_BODY: usize = 7;

    /// Largest body a 3-channel header can describe.
    pub const MAX_BODY_3CH: usize = 6;

    pub fn new(kind: u8, body: &[u8]) -> Option<Self> {
        if body.len() > Self::MAX_BODY {
            return None;
        }
        let mut data = [0; Self::MAX_BODY];
        data[..body.len()].copy_from_slice(body);
        Some(Self {
            kind: kind & 0xf8,
            body: data,
            len: body.len() as u8,
        })
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn body(&self) -> &[u8] {
        &self.body[..self.len as usize]
    }

    /// Bytes occupied on air, info byte included.
    pub fn wire_len(&self) -> usize {
        1 + self.len as usize
    }

    /// The info byte as written for a format.
    pub fn info_byte(&self, format: HeaderFormat) -> u8 {
        match format {
            HeaderFormat::LongRange => self.kind | self.len,
            _ => self.kind | (self.len + 1),
        }
    }
}

/// Logical header contents, shared by every format.
///
/// Fields a format cannot carry are ignored when encoding and come
/// back as zero or false when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameOptions {
    pub frame_type: FrameType,
    pub home_id: [u8; HOME_ID_LEN],
    pub source: u16,
    /// Unused for multicast frames, which address by mask instead.
    pub destination: u16,
    pub sequence: u8,
    pub acknowledge: bool,
    pub low_power: bool,
    pub speed_modified: bool,
    pub multicast_followup: bool,
    pub wakeup_250ms: bool,
    pub wakeup_1000ms: bool,
    pub extension: Option<HeaderExtension>,
    /// Long Range noise floor reported by the sender.
    pub noise_floor: i8,
    /// Long Range transmit power reported by the sender.
    pub tx_power: i8,
    /// Long Range ACK only, the RSSI the acknowledged frame arrived with.
    pub receive_rssi: i8,
}

impl FrameOptions {
    pub fn new(frame_type: FrameType, home_id: [u8; HOME_ID_LEN], source: u16, destination: u16) -> Self {
        Self {
            frame_type,
            home_id,
            source,
            destination,
            sequence: 0,
            acknowledge: false,
            low_power: false,
            speed_modified: false,
            multicast_followup: false,
            wakeup_250ms: false,
            wakeup_1000ms: false,
            extension: None,
            noise_floor: 0,
            tx_power: 0,
            receive_rssi: 0,
        }
    }

    pub fn routed(&self) -> bool {
        self.frame_type == FrameType::Routed
    }

    pub fn extended(&self) -> bool {
        self.extension.is_some()
    }

    /// Home id as the little-endian word radios hash.
    pub fn home_id_word(&self) -> u32 {
        u32::from_le_bytes(self.home_id)
    }
}

/// 2-channel header byte 5.
#[cfg_attr(not(feature = "defmt"), bitfield(u8))]
#[cfg_attr(feature = "defmt", bitfield(u8, defmt = true))]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Info2ch {
    #[bits(4)]
    pub header_type: u8,
    pub speed_modified: bool,
    pub low_power: bool,
    pub ack: bool,
    pub routed: bool,
}

/// 2-channel header byte 6.
#[cfg_attr(not(feature = "defmt"), bitfield(u8))]
#[cfg_attr(feature = "defmt", bitfield(u8, defmt = true))]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Control2ch {
    #[bits(4)]
    pub sequence: u8,
    __: bool,
    pub wakeup_250ms: bool,
    pub wakeup_1000ms: bool,
    pub multicast_followup: bool,
}

/// 3-channel header byte 5.
#[cfg_attr(not(feature = "defmt"), bitfield(u8))]
#[cfg_attr(feature = "defmt", bitfield(u8, defmt = true))]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Info3ch {
    #[bits(4)]
    pub header_type: u8,
    __: bool,
    pub multicast_followup: bool,
    pub low_power: bool,
    pub ack: bool,
}

/// 3-channel header byte 6.
#[cfg_attr(not(feature = "defmt"), bitfield(u8))]
#[cfg_attr(feature = "defmt", bitfield(u8, defmt = true))]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Extra3ch {
    #[bits(4)]
    __: u8,
    pub wakeup_250ms: bool,
    pub wakeup_1000ms: bool,
    __: bool,
    pub extended: bool,
}

/// Long Range header byte 8.
#[cfg_attr(not(feature = "defmt"), bitfield(u8))]
#[cfg_attr(feature = "defmt", bitfield(u8, defmt = true))]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InfoLr {
    #[bits(3)]
    pub header_type: u8,
    #[bits(3)]
    __: u8,
    pub extended: bool,
    pub ack: bool,
}

/// Pack Long Range source and destination ids into three bytes.
pub fn pack_lr_ids(source: u16, destination: u16) -> [u8; 3] {
    [
        (source >> 4) as u8,
        (((source & 0x0f) << 4) as u8) | ((destination >> 8) & 0x0f) as u8,
        destination as u8,
    ]
}

/// Unpack Long Range (source, destination) ids.
pub fn unpack_lr_ids(ids: [u8; 3]) -> (u16, u16) {
    let source = ((ids[0] as u16) << 4) | ((ids[1] as u16) >> 4);
    let destination = (((ids[1] & 0x0f) as u16) << 8) | ids[2] as u16;
    (source, destination)
}
