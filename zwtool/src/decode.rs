use zwlink::frame::{decode, DecodedFrame, ExploreHeader, FrameType};

use crate::common::{parse_hex, CrcArg, FormatArg};
use crate::hexdump;

#[derive(clap::Args, Debug)]
pub struct DecodeOpts {
    /// Frame bytes in hex, checksum included.
    frame: String,
    #[arg(long, value_enum, default_value = "2ch")]
    format: FormatArg,
    #[arg(long, value_enum, default_value = "crc8")]
    crc: CrcArg,
}

impl crate::ToolRun for DecodeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let raw = parse_hex(&self.frame)?;
        let frame = match decode(&raw, self.format.into(), self.crc.into()) {
            Ok(frame) => frame,
            Err(e) => {
                println!("Undecoded frame:");
                hexdump::hexdump(&raw);
                anyhow::bail!(e);
            }
        };
        print_frame(&frame);
        Ok(())
    }
}

pub fn print_frame(frame: &DecodedFrame) {
    let options = &frame.options;
    println!("format: {:?}", frame.format);
    println!("type: {:?}", options.frame_type);
    println!("home id: {}", hex::encode(options.home_id));
    println!("source: {}", options.source);
    if options.frame_type != FrameType::Multicast {
        println!("destination: {}", options.destination);
    }
    println!("sequence: {}", options.sequence);
    println!(
        "flags: ack {} low power {} speed modified {}",
        options.acknowledge, options.low_power, options.speed_modified
    );
    if frame.format.wide_node_ids() {
        println!(
            "noise floor: {} tx power: {}",
            options.noise_floor, options.tx_power
        );
    }
    if let Some(ext) = options.extension {
        println!("extension: {:?}", ext);
    }
    if !frame.route.is_empty() {
        println!("route: {}", hex::encode(frame.route));
    }

    let mut payload = frame.payload;
    if options.frame_type == FrameType::Explore {
        match ExploreHeader::decode(payload) {
            Ok((header, rest)) => {
                println!(
                    "explore: {:?} option {:?} interval {} repeaters {:?} ({} of ttl {})",
                    header.command(),
                    header.option,
                    header.random_interval,
                    header.repeaters,
                    header.repeater_count(),
                    header.ttl()
                );
                payload = rest;
            }
            Err(e) => println!("explore header: {}", e),
        }
    }

    println!();
    println!("Payload:");
    hexdump::hexdump(payload);
}
