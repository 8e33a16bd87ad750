use crate::frame::crc::CrcWidth;
use crate::frame::HeaderFormat;
use crate::Error;

/// Air data rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    Rate9k6,
    Rate40k,
    Rate100k,
}

impl Speed {
    pub fn bits_per_second(&self) -> u32 {
        match self {
            Self::Rate9k6 => 9600,
            Self::Rate40k => 40_000,
            Self::Rate100k => 100_000,
        }
    }
}

/// Logical transmission profiles.
///
/// The discriminants match the profile ids used by the rest of the
/// protocol stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommunicationProfile {
    #[default]
    Unsupported = 0,
    Rate9k6 = 1,
    Rate40k = 2,
    Rate40kWakeup250ms = 3,
    Rate40kWakeup1000ms = 4,
    Rate100k = 5,
    LongRangeA = 6,
    LongRangeB = 7,
    LongRangeWakeupA = 8,
    LongRangeWakeupB = 9,
    ThreeChannel = 10,
    ThreeChannelWakeup = 11,
    ThreeChannelA = 12,
    ThreeChannelB = 13,
    ThreeChannelC = 14,
    ThreeChannelWakeupA = 15,
    ThreeChannelWakeupB = 16,
    ThreeChannelWakeupC = 17,
}

/// Concrete PHY settings for one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitParameters {
    pub speed: Speed,
    pub channel: u8,
    /// Checksum the radio appends. Beams carry none.
    pub crc: CrcWidth,
    pub preamble_len: u16,
    /// How many times a beam repeats. Zero for data frames.
    pub repeats: u16,
}

/// Wakeup beam durations, in milliseconds.
pub const BEAM_250MS_DURATION: u32 = 275;
pub const BEAM_1000MS_DURATION: u32 = 1100;
pub const BEAM_3CH_FRAGMENT_DURATION: u32 = 100;
pub const BEAM_LR_FRAGMENT_DURATION: u32 = 114;

/// Beam body lengths, beam tag included.
pub const BEAM_LEN: usize = 3;
pub const BEAM_LR_LEN: usize = 4;

/// Repeats needed for a beam to cover `duration_ms`: preamble, one
/// start of frame byte, and the beam body, over and over.
pub const fn beam_repeats(speed_bps: u32, duration_ms: u32, preamble: u32, beam_len: u32) -> u16 {
    let bytes = (speed_bps / 8 * duration_ms) / 1000;
    (1 + bytes / (preamble + 1 + beam_len)) as u16
}

const REPEATS_250: u16 = beam_repeats(40_000, BEAM_250MS_DURATION, 20, BEAM_LEN as u32);
const REPEATS_1000: u16 = beam_repeats(40_000, BEAM_1000MS_DURATION, 20, BEAM_LEN as u32);
const REPEATS_3CH: u16 = beam_repeats(100_000, BEAM_3CH_FRAGMENT_DURATION, 8, BEAM_LEN as u32);
const REPEATS_LR: u16 = beam_repeats(100_000, BEAM_LR_FRAGMENT_DURATION, 8, BEAM_LR_LEN as u32);

impl CommunicationProfile {
    pub const ALL: [CommunicationProfile; 18] = [
        Self::Unsupported,
        Self::Rate9k6,
        Self::Rate40k,
        Self::Rate40kWakeup250ms,
        Self::Rate40kWakeup1000ms,
        Self::Rate100k,
        Self::LongRangeA,
        Self::LongRangeB,
        Self::LongRangeWakeupA,
        Self::LongRangeWakeupB,
        Self::ThreeChannel,
        Self::ThreeChannelWakeup,
        Self::ThreeChannelA,
        Self::ThreeChannelB,
        Self::ThreeChannelC,
        Self::ThreeChannelWakeupA,
        Self::ThreeChannelWakeupB,
        Self::ThreeChannelWakeupC,
    ];

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// PHY transmit parameters for this profile.
    pub fn resolve(&self) -> Result<TransmitParameters, Error> {
        use CommunicationProfile::*;
        let channel = self.channel();
        let params = |speed, crc, preamble_len, repeats| TransmitParameters {
            speed,
            channel,
            crc,
            preamble_len,
            repeats,
        };
        Ok(match self {
            Unsupported => return Err(Error::Unsupported),
            Rate9k6 => TransmitParameters {
                channel: 2,
                ..params(Speed::Rate9k6, CrcWidth::Crc8, 10, 0)
            },
            Rate40k => params(Speed::Rate40k, CrcWidth::Crc8, 20, 0),
            Rate100k => params(Speed::Rate100k, CrcWidth::Crc16, 40, 0),
            Rate40kWakeup250ms => params(Speed::Rate40k, CrcWidth::None, 20, REPEATS_250),
            Rate40kWakeup1000ms => params(Speed::Rate40k, CrcWidth::None, 20, REPEATS_1000),
            ThreeChannel | ThreeChannelA | ThreeChannelB | ThreeChannelC => {
                params(Speed::Rate100k, CrcWidth::Crc16, 24, 0)
            }
            ThreeChannelWakeup | ThreeChannelWakeupA | ThreeChannelWakeupB
            | ThreeChannelWakeupC => params(Speed::Rate100k, CrcWidth::None, 8, REPEATS_3CH),
            LongRangeA => TransmitParameters {
                channel: 3,
                ..params(Speed::Rate100k, CrcWidth::Crc16, 40, 0)
            },
            LongRangeB => TransmitParameters {
                channel: 4,
                ..params(Speed::Rate100k, CrcWidth::Crc16, 40, 0)
            },
            LongRangeWakeupA => TransmitParameters {
                channel: 3,
                ..params(Speed::Rate100k, CrcWidth::None, 8, REPEATS_LR)
            },
            LongRangeWakeupB => TransmitParameters {
                channel: 4,
                ..params(Speed::Rate100k, CrcWidth::None, 8, REPEATS_LR)
            },
        })
    }

    /// PHY channel number this profile reports for diagnostics.
    ///
    /// This is a pure lookup, and differs from the channel
    /// [resolve](Self::resolve) transmits on for some 2-channel and
    /// Long Range profiles.
    pub fn channel(&self) -> u8 {
        use CommunicationProfile::*;
        match self {
            Rate9k6 | Rate40k | Rate40kWakeup250ms | Rate40kWakeup1000ms => 1,
            ThreeChannelA | ThreeChannelWakeupA => 0,
            ThreeChannelB | ThreeChannelWakeupB => 1,
            ThreeChannelC | ThreeChannelWakeupC => 2,
            LongRangeA | LongRangeB | LongRangeWakeupA => 3,
            LongRangeWakeupB => 4,
            _ => 0,
        }
    }

    /// Header layout frames on this profile use.
    pub fn header_format(&self) -> Option<HeaderFormat> {
        use CommunicationProfile::*;
        match self {
            Unsupported => None,
            LongRangeA | LongRangeB | LongRangeWakeupA | LongRangeWakeupB => {
                Some(HeaderFormat::LongRange)
            }
            Rate9k6 | Rate40k | Rate40kWakeup250ms | Rate40kWakeup1000ms | Rate100k => {
                Some(HeaderFormat::TwoChannel)
            }
            _ => Some(HeaderFormat::ThreeChannel),
        }
    }

    /// Whether this profile sends a wakeup beam.
    pub fn is_beam(&self) -> bool {
        self.data_profile() != *self
    }

    pub fn is_long_range(&self) -> bool {
        self.header_format() == Some(HeaderFormat::LongRange)
    }

    /// Profile that carries the frame itself after a beam.
    pub fn data_profile(&self) -> Self {
        use CommunicationProfile::*;
        match self {
            Rate40kWakeup250ms | Rate40kWakeup1000ms => Rate40k,
            ThreeChannelWakeup => ThreeChannel,
            ThreeChannelWakeupA => ThreeChannelA,
            ThreeChannelWakeupB => ThreeChannelB,
            ThreeChannelWakeupC => ThreeChannelC,
            LongRangeWakeupA => LongRangeA,
            LongRangeWakeupB => LongRangeB,
            other => *other,
        }
    }

    /// How long this profile's beam lasts, in milliseconds.
    pub fn beam_duration(&self) -> Option<u32> {
        use CommunicationProfile::*;
        match self {
            Rate40kWakeup250ms => Some(BEAM_250MS_DURATION),
            Rate40kWakeup1000ms => Some(BEAM_1000MS_DURATION),
            ThreeChannelWakeup | ThreeChannelWakeupA | ThreeChannelWakeupB
            | ThreeChannelWakeupC => Some(BEAM_3CH_FRAGMENT_DURATION),
            LongRangeWakeupA | LongRangeWakeupB => Some(BEAM_LR_FRAGMENT_DURATION),
            _ => None,
        }
    }
}

impl core::fmt::Display for CommunicationProfile {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use CommunicationProfile::*;
        let name = match self {
            Unsupported => "unsupported",
            Rate9k6 => "9.6k",
            Rate40k => "40k",
            Rate40kWakeup250ms => "40k wakeup 250ms",
            Rate40kWakeup1000ms => "40k wakeup 1000ms",
            Rate100k => "100k",
            LongRangeA => "LR A",
            LongRangeB => "LR B",
            LongRangeWakeupA => "LR wakeup fragment A",
            LongRangeWakeupB => "LR wakeup fragment B",
            ThreeChannel => "3ch 100k",
            ThreeChannelWakeup => "3ch wakeup fragment",
            ThreeChannelA => "3ch 100k A",
            ThreeChannelB => "3ch 100k B",
            ThreeChannelC => "3ch 100k C",
            ThreeChannelWakeupA => "3ch wakeup fragment A",
            ThreeChannelWakeupB => "3ch wakeup fragment B",
            ThreeChannelWakeupC => "3ch wakeup fragment C",
        };
        write!(f, "{}", name)
    }
}

/// Channel layouts a region can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolMode {
    /// Classic 2-channel (9.6k / 40k / 100k).
    TwoChannel = 1,
    /// 3-channel 100k, as used in Japan and Korea.
    ThreeChannel = 2,
    /// Classic 2-channel plus one Long Range channel.
    TwoChannelLongRange = 3,
    /// Long Range only.
    LongRange = 4,
}

impl ProtocolMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::TwoChannel),
            2 => Some(Self::ThreeChannel),
            3 => Some(Self::TwoChannelLongRange),
            4 => Some(Self::LongRange),
            _ => None,
        }
    }

    /// Whether frames in this header format belong to this mode.
    pub fn accepts(&self, format: HeaderFormat) -> bool {
        use HeaderFormat::*;
        matches!(
            (self, format),
            (Self::TwoChannel, TwoChannel)
                | (Self::ThreeChannel, ThreeChannel)
                | (Self::TwoChannelLongRange, TwoChannel | LongRange)
                | (Self::LongRange, LongRange)
        )
    }

    pub fn has_long_range(&self) -> bool {
        matches!(self, Self::TwoChannelLongRange | Self::LongRange)
    }
}

/// Long Range channel configuration reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LrChannelConfig {
    /// No Long Range, or an end device in a classic network.
    #[default]
    NoLongRange,
    /// Controller with primary channel A.
    Config1,
    /// Controller with primary channel B.
    Config2,
    /// End device included in a Long Range network.
    Config3,
}

/// Number of receive channels a radio can report.
pub const ACTIVE_PROFILES: usize = 5;

/// Profiles that receive channel ids map to, by protocol mode.
pub fn active_profiles(
    mode: ProtocolMode,
    lr_config: LrChannelConfig,
) -> [CommunicationProfile; ACTIVE_PROFILES] {
    use CommunicationProfile::*;
    let mut table = [Unsupported; ACTIVE_PROFILES];
    match mode {
        ProtocolMode::TwoChannel => {
            table[..3].copy_from_slice(&[Rate9k6, Rate40k, Rate100k]);
        }
        ProtocolMode::ThreeChannel => {
            table[..3].copy_from_slice(&[ThreeChannelA, ThreeChannelB, ThreeChannelC]);
        }
        ProtocolMode::TwoChannelLongRange => {
            table[..3].copy_from_slice(&[Rate9k6, Rate40k, Rate100k]);
            table[3] = match lr_config {
                LrChannelConfig::Config1 => LongRangeA,
                _ => LongRangeB,
            };
        }
        ProtocolMode::LongRange => {
            table[3] = LongRangeA;
            table[4] = LongRangeB;
        }
    }
    table
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn beam_repeat_counts() {
        assert_eq!(REPEATS_250, 58);
        assert_eq!(REPEATS_1000, 230);
        assert_eq!(REPEATS_3CH, 105);
        assert_eq!(REPEATS_LR, 110);
    }

    #[test]
    fn resolve_table() {
        use CommunicationProfile::*;
        let p = Rate9k6.resolve().unwrap();
        assert_eq!((p.speed, p.channel, p.crc, p.preamble_len, p.repeats), (Speed::Rate9k6, 2, CrcWidth::Crc8, 10, 0));
        let p = Rate40k.resolve().unwrap();
        assert_eq!((p.speed, p.channel, p.crc, p.preamble_len, p.repeats), (Speed::Rate40k, 1, CrcWidth::Crc8, 20, 0));
        let p = Rate100k.resolve().unwrap();
        assert_eq!((p.speed, p.channel, p.crc, p.preamble_len, p.repeats), (Speed::Rate100k, 0, CrcWidth::Crc16, 40, 0));
        let p = Rate40kWakeup250ms.resolve().unwrap();
        assert_eq!((p.speed, p.channel, p.crc, p.preamble_len, p.repeats), (Speed::Rate40k, 1, CrcWidth::None, 20, 58));
        let p = Rate40kWakeup1000ms.resolve().unwrap();
        assert_eq!(p.repeats, 230);
        let p = ThreeChannelC.resolve().unwrap();
        assert_eq!((p.speed, p.channel, p.crc, p.preamble_len), (Speed::Rate100k, 2, CrcWidth::Crc16, 24));
        let p = ThreeChannelWakeupB.resolve().unwrap();
        assert_eq!((p.channel, p.crc, p.preamble_len, p.repeats), (1, CrcWidth::None, 8, 105));
        let p = LongRangeB.resolve().unwrap();
        assert_eq!((p.channel, p.crc, p.preamble_len), (4, CrcWidth::Crc16, 40));
        let p = LongRangeWakeupA.resolve().unwrap();
        assert_eq!((p.channel, p.crc, p.preamble_len, p.repeats), (3, CrcWidth::None, 8, 110));
    }

    #[test]
    fn resolve_unsupported() {
        assert_eq!(CommunicationProfile::Unsupported.resolve(), Err(Error::Unsupported));
    }

    #[test]
    fn only_100k_uses_crc16() {
        for profile in CommunicationProfile::ALL {
            if let Ok(p) = profile.resolve() {
                if profile.is_beam() {
                    assert_eq!(p.crc, CrcWidth::None);
                } else if p.speed == Speed::Rate100k {
                    assert_eq!(p.crc, CrcWidth::Crc16, "{}", profile);
                } else {
                    assert_eq!(p.crc, CrcWidth::Crc8, "{}", profile);
                }
            }
        }
    }

    #[test]
    fn channels() {
        use CommunicationProfile::*;
        assert_eq!(Rate9k6.channel(), 1);
        assert_eq!(Rate100k.channel(), 0);
        assert_eq!(ThreeChannelB.channel(), 1);
        assert_eq!(ThreeChannelWakeupC.channel(), 2);
        assert_eq!(LongRangeB.channel(), 3);
        assert_eq!(LongRangeWakeupB.channel(), 4);
        assert_eq!(ThreeChannel.channel(), 0);
    }

    #[test]
    fn data_profiles() {
        use CommunicationProfile::*;
        assert_eq!(Rate40kWakeup1000ms.data_profile(), Rate40k);
        assert_eq!(ThreeChannelWakeupA.data_profile(), ThreeChannelA);
        assert_eq!(LongRangeWakeupB.data_profile(), LongRangeB);
        assert!(!Rate100k.is_beam());
        assert!(LongRangeWakeupA.is_beam());
        assert!(LongRangeWakeupA.is_long_range());
    }

    #[test]
    fn ids_round_trip() {
        for profile in CommunicationProfile::ALL {
            assert_eq!(CommunicationProfile::from_id(profile.id()), Some(profile));
        }
        assert_eq!(CommunicationProfile::from_id(18), None);
    }

    #[test]
    fn region_restriction() {
        use CommunicationProfile::*;
        let fmt = |p: CommunicationProfile| p.header_format().unwrap();
        assert!(ProtocolMode::TwoChannel.accepts(fmt(Rate40k)));
        assert!(!ProtocolMode::TwoChannel.accepts(fmt(ThreeChannelA)));
        assert!(!ProtocolMode::TwoChannel.accepts(fmt(LongRangeA)));
        assert!(ProtocolMode::ThreeChannel.accepts(fmt(ThreeChannelWakeupB)));
        assert!(!ProtocolMode::ThreeChannel.accepts(fmt(Rate9k6)));
        assert!(ProtocolMode::TwoChannelLongRange.accepts(fmt(LongRangeWakeupA)));
        assert!(ProtocolMode::TwoChannelLongRange.accepts(fmt(Rate100k)));
        assert!(ProtocolMode::LongRange.accepts(fmt(LongRangeB)));
        assert!(!ProtocolMode::LongRange.accepts(fmt(Rate100k)));
    }

    #[test]
    fn active_tables() {
        use CommunicationProfile::*;
        assert_eq!(
            active_profiles(ProtocolMode::TwoChannel, LrChannelConfig::NoLongRange),
            [Rate9k6, Rate40k, Rate100k, Unsupported, Unsupported]
        );
        assert_eq!(
            active_profiles(ProtocolMode::ThreeChannel, LrChannelConfig::NoLongRange),
            [ThreeChannelA, ThreeChannelB, ThreeChannelC, Unsupported, Unsupported]
        );
        assert_eq!(
            active_profiles(ProtocolMode::TwoChannelLongRange, LrChannelConfig::Config1)[3],
            LongRangeA
        );
        assert_eq!(
            active_profiles(ProtocolMode::TwoChannelLongRange, LrChannelConfig::Config2)[3],
            LongRangeB
        );
        assert_eq!(
            active_profiles(ProtocolMode::LongRange, LrChannelConfig::Config3),
            [Unsupported, Unsupported, Unsupported, LongRangeA, LongRangeB]
        );
    }
}
