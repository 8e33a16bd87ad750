//! Explorer frame header, carried at the start of an explore frame's
//! payload.

use bitfield_struct::bitfield;
use bitflags::bitflags;
use nom::IResult;

use super::serialize::Serializer;
use crate::DecodeError;

/// Explorer header version in use.
pub const VERSION: u8 = 0x20;

/// Low bits of the version byte holding the command.
pub const COMMAND_MASK: u8 = 0x1f;

/// Most repeaters an explorer frame can pass through.
pub const MAX_REPEATERS: usize = 4;

/// Encoded explorer header length.
pub const HEADER_LEN: usize = 4 + MAX_REPEATERS;

/// Shortest payload carrying a search result.
pub const SEARCH_RESULT_LEN: usize = HEADER_LEN + 3 + MAX_REPEATERS;

/// Shortest payload carrying an auto-inclusion request: the header,
/// a network home id, and a command class header plus node info.
pub const AUTO_INCLUSION_MIN_LEN: usize = HEADER_LEN + 4 + 6;

/// Default random backoff window placed in new frames.
pub const RANDOM_INTERVAL_DEFAULT: u8 = 250;

/// What an explorer frame asks of its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ExploreCommand {
    Normal = 0,
    AutoInclusion = 1,
    SearchResult = 2,
}

impl ExploreCommand {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::AutoInclusion),
            2 => Some(Self::SearchResult),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

bitflags! {
    /// Explorer header option byte.
    #[repr(transparent)]
    #[derive(Default)]
    pub struct ExploreOption: u8 {
        const SOURCE_ROUTED = 0x01;
        /// Set on frames travelling back towards the originator.
        const DIRECTION = 0x02;
        /// Receivers should purge their own queued explorer frames.
        const STOP = 0x04;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ExploreOption {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ExploreOption({=u8:x})", self.bits)
    }
}

/// Repeater count in the low nibble, session TTL in the high nibble.
#[cfg_attr(not(feature = "defmt"), bitfield(u8))]
#[cfg_attr(feature = "defmt", bitfield(u8, defmt = true))]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepeaterCountTtl {
    #[bits(4)]
    pub count: u8,
    #[bits(4)]
    pub ttl: u8,
}

impl RepeaterCountTtl {
    /// A fresh frame: no repeaters yet, every hop still available.
    pub fn fresh() -> Self {
        Self::new().with_ttl(MAX_REPEATERS as u8)
    }
}

/// The eight byte explorer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExploreHeader {
    /// Upper three bits of the first byte.
    pub version: u8,
    /// Raw command code, see [ExploreCommand].
    pub command: u8,
    pub option: ExploreOption,
    pub random_interval: u8,
    pub hops: RepeaterCountTtl,
    pub repeaters: [u8; MAX_REPEATERS],
}

impl Default for ExploreHeader {
    fn default() -> Self {
        Self::new(ExploreCommand::Normal)
    }
}

impl ExploreHeader {
    /// A header for a frame this node originates.
    pub fn new(command: ExploreCommand) -> Self {
        Self {
            version: VERSION,
            command: command.code(),
            option: ExploreOption::empty(),
            random_interval: RANDOM_INTERVAL_DEFAULT,
            hops: RepeaterCountTtl::fresh(),
            repeaters: [0; MAX_REPEATERS],
        }
    }

    pub fn command(&self) -> Option<ExploreCommand> {
        ExploreCommand::from_code(self.command)
    }

    pub fn repeater_count(&self) -> u8 {
        self.hops.count()
    }

    pub fn ttl(&self) -> u8 {
        self.hops.ttl()
    }

    pub fn has_repeater(&self, node: u8) -> bool {
        self.repeaters.contains(&node)
    }

    /// Whether the route recorded in this header is one a
    /// well-behaved network could produce.
    ///
    /// TTL and repeater count always add up to [MAX_REPEATERS], the
    /// repeater list has no gaps, and no node repeats twice.
    pub fn route_valid(&self) -> bool {
        if (self.ttl() + self.repeater_count()) as usize != MAX_REPEATERS {
            return false;
        }
        let route = &self.repeaters;
        for i in 1..MAX_REPEATERS {
            if route[i] == 0 {
                continue;
            }
            if route[i - 1] == 0 {
                return false;
            }
            if route[..i].contains(&route[i]) {
                return false;
            }
        }
        true
    }

    /// Parse a header from the front of an explore frame's payload.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, ver_cmd) = nom::number::complete::u8(input)?;
        let (input, option) = nom::number::complete::u8(input)?;
        let (input, random_interval) = nom::number::complete::u8(input)?;
        let (input, hops) = nom::number::complete::u8(input)?;
        let mut repeaters = [0; MAX_REPEATERS];
        let (input, _) = nom::multi::fill(nom::number::complete::u8, &mut repeaters[..])(input)?;

        Ok((
            input,
            Self {
                version: ver_cmd & !COMMAND_MASK,
                command: ver_cmd & COMMAND_MASK,
                option: ExploreOption::from_bits_truncate(option),
                random_interval,
                hops: hops.into(),
                repeaters,
            },
        ))
    }

    /// Split an explore frame's payload into header and piggy-backed
    /// data.
    pub fn decode(payload: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        match Self::parse(payload) {
            Ok((rest, header)) => Ok((header, rest)),
            Err(_) => Err(DecodeError::MalformedFrame),
        }
    }

    pub fn write<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_u8(self.version | (self.command & COMMAND_MASK))?;
        ser.write_u8(self.option.bits())?;
        ser.write_u8(self.random_interval)?;
        ser.write_u8(self.hops.into())?;
        ser.write_bytes(&self.repeaters)
    }

    /// Byte form, as it appears on air.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0; HEADER_LEN];
        out[0] = self.version | (self.command & COMMAND_MASK);
        out[1] = self.option.bits();
        out[2] = self.random_interval;
        out[3] = self.hops.into();
        out[4..].copy_from_slice(&self.repeaters);
        out
    }
}

/// Body of a search result, following its explorer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SearchResult {
    /// The node the result answers for.
    pub node: u8,
    pub frame_handle: u8,
    pub hops: RepeaterCountTtl,
    pub repeaters: [u8; MAX_REPEATERS],
}

impl SearchResult {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, node) = nom::number::complete::u8(input)?;
        let (input, frame_handle) = nom::number::complete::u8(input)?;
        let (input, hops) = nom::number::complete::u8(input)?;
        let mut repeaters = [0; MAX_REPEATERS];
        let (input, _) = nom::multi::fill(nom::number::complete::u8, &mut repeaters[..])(input)?;
        Ok((
            input,
            Self {
                node,
                frame_handle,
                hops: hops.into(),
                repeaters,
            },
        ))
    }
}
