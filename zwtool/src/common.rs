use zwlink::frame::crc::CrcWidth;
use zwlink::frame::{FrameType, HeaderFormat, HOME_ID_LEN};
use zwlink::{CommunicationProfile, LrChannelConfig, ProtocolMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum FormatArg {
    #[value(name = "2ch")]
    TwoChannel,
    #[value(name = "3ch")]
    ThreeChannel,
    Lr,
}

impl From<FormatArg> for HeaderFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::TwoChannel => HeaderFormat::TwoChannel,
            FormatArg::ThreeChannel => HeaderFormat::ThreeChannel,
            FormatArg::Lr => HeaderFormat::LongRange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum CrcArg {
    #[value(name = "none")]
    NoCrc,
    Crc8,
    Crc16,
}

impl From<CrcArg> for CrcWidth {
    fn from(value: CrcArg) -> Self {
        match value {
            CrcArg::NoCrc => CrcWidth::None,
            CrcArg::Crc8 => CrcWidth::Crc8,
            CrcArg::Crc16 => CrcWidth::Crc16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum ModeArg {
    #[value(name = "2ch")]
    TwoChannel,
    #[value(name = "3ch")]
    ThreeChannel,
    #[value(name = "2ch-lr")]
    TwoChannelLongRange,
    Lr,
}

impl From<ModeArg> for ProtocolMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::TwoChannel => ProtocolMode::TwoChannel,
            ModeArg::ThreeChannel => ProtocolMode::ThreeChannel,
            ModeArg::TwoChannelLongRange => ProtocolMode::TwoChannelLongRange,
            ModeArg::Lr => ProtocolMode::LongRange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum LrConfigArg {
    #[value(name = "none")]
    NoLongRange,
    Config1,
    Config2,
    Config3,
}

impl From<LrConfigArg> for LrChannelConfig {
    fn from(value: LrConfigArg) -> Self {
        match value {
            LrConfigArg::NoLongRange => LrChannelConfig::NoLongRange,
            LrConfigArg::Config1 => LrChannelConfig::Config1,
            LrConfigArg::Config2 => LrChannelConfig::Config2,
            LrConfigArg::Config3 => LrChannelConfig::Config3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum TypeArg {
    Singlecast,
    Multicast,
    Ack,
    Explore,
    Routed,
}

impl From<TypeArg> for FrameType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Singlecast => FrameType::Singlecast,
            TypeArg::Multicast => FrameType::Multicast,
            TypeArg::Ack => FrameType::Ack,
            TypeArg::Explore => FrameType::Explore,
            TypeArg::Routed => FrameType::Routed,
        }
    }
}

/// Which network a command acts as a member of.
#[derive(clap::Args, Debug, Clone)]
pub struct NetworkArgs {
    #[arg(long, value_enum, default_value = "2ch")]
    pub mode: ModeArg,
    #[arg(long, value_enum, default_value = "none")]
    pub lr_config: LrConfigArg,
    #[arg(long, value_parser = parse_home_id, default_value = "cafebabf")]
    pub home: [u8; HOME_ID_LEN],
    #[arg(long, default_value_t = 1)]
    pub node: u16,
}

pub fn parse_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    Ok(hex::decode(cleaned)?)
}

pub fn parse_home_id(s: &str) -> anyhow::Result<[u8; HOME_ID_LEN]> {
    let bytes = parse_hex(s)?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("home id needs {} bytes, got {}", HOME_ID_LEN, b.len()))
}

pub fn parse_profile(s: &str) -> anyhow::Result<CommunicationProfile> {
    CommunicationProfile::ALL
        .iter()
        .copied()
        .find(|p| p.to_string().replace(' ', "-").eq_ignore_ascii_case(s))
        .ok_or_else(|| anyhow::anyhow!("unknown profile {:?}", s))
}
