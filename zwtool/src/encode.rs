use zwlink::frame::{encode_frame, FrameOptions};

use crate::common::{parse_hex, parse_home_id, CrcArg, FormatArg, TypeArg};
use crate::hexdump;

#[derive(clap::Args, Debug)]
pub struct EncodeOpts {
    /// Payload bytes in hex.
    #[arg(default_value = "")]
    payload: String,
    #[arg(long = "type", value_enum, default_value = "singlecast")]
    frame_type: TypeArg,
    #[arg(long, value_enum, default_value = "2ch")]
    format: FormatArg,
    #[arg(long, value_enum, default_value = "crc8")]
    crc: CrcArg,
    #[arg(long, value_parser = parse_home_id, default_value = "cafebabf")]
    home: [u8; 4],
    #[arg(short, long, default_value_t = 1)]
    source: u16,
    #[arg(short, long, default_value_t = 2)]
    destination: u16,
    #[arg(long, default_value_t = 0)]
    sequence: u8,
    #[arg(long)]
    ack: bool,
    #[arg(long)]
    low_power: bool,
    /// Print plain hex instead of a dump.
    #[arg(long)]
    raw: bool,
}

impl crate::ToolRun for EncodeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let payload = parse_hex(&self.payload)?;
        let mut options =
            FrameOptions::new(self.frame_type.into(), self.home, self.source, self.destination);
        options.sequence = self.sequence;
        options.acknowledge = self.ack;
        options.low_power = self.low_power;

        let frame = encode_frame(&options, self.format.into(), &payload, self.crc.into())?;
        if self.raw {
            println!("{}", hex::encode(frame.as_slice()));
        } else {
            hexdump::hexdump(frame.as_slice());
        }
        Ok(())
    }
}
